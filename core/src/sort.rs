use crate::analyzer::AnalyzedRow;
use serde::Deserialize;
use serde::Serialize;
use std::cmp::Ordering;

/// Named row orderings. Every comparator is total, and rows that compare equal
/// keep their input order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CodeDesc,
    CodeAsc,
    /// App name, compared case-insensitively (lowercased) with the raw text
    /// as tie-break. This approximates locale collation; accents and
    /// language-specific ordering are not taken into account.
    NameAsc,
    /// Reverse of [`SortKey::NameAsc`].
    NameDesc,
    DateDesc,
    DateAsc,
    IssuesFirst,
}

impl SortKey {
    pub const ALL: [SortKey; 7] = [
        SortKey::CodeDesc,
        SortKey::CodeAsc,
        SortKey::NameAsc,
        SortKey::NameDesc,
        SortKey::DateDesc,
        SortKey::DateAsc,
        SortKey::IssuesFirst,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::CodeDesc => "code_desc",
            SortKey::CodeAsc => "code_asc",
            SortKey::NameAsc => "name_asc",
            SortKey::NameDesc => "name_desc",
            SortKey::DateDesc => "date_desc",
            SortKey::DateAsc => "date_asc",
            SortKey::IssuesFirst => "issues_first",
        }
    }

    /// Parse a sort name; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(name))
    }

    pub fn compare(self, a: &AnalyzedRow, b: &AnalyzedRow) -> Ordering {
        match self {
            SortKey::CodeDesc => missing_last(a.meta.code, b.meta.code, |x, y| y.total_cmp(&x)),
            SortKey::CodeAsc => missing_last(a.meta.code, b.meta.code, |x, y| x.total_cmp(&y)),
            SortKey::NameAsc => compare_names(a, b),
            SortKey::NameDesc => compare_names(b, a),
            SortKey::DateDesc => date_desc(a, b),
            SortKey::DateAsc => {
                missing_last(a.meta.date_value, b.meta.date_value, |x, y| x.cmp(&y))
            }
            SortKey::IssuesFirst => a
                .meta
                .severity
                .rank()
                .cmp(&b.meta.severity.rank())
                .then_with(|| date_desc(a, b)),
        }
    }
}

/// Sort rows in place. `sort_by` is stable, so ties keep dataset order.
pub fn sort_rows(rows: &mut [AnalyzedRow], key: SortKey) {
    rows.sort_by(|a, b| key.compare(a, b));
}

fn date_desc(a: &AnalyzedRow, b: &AnalyzedRow) -> Ordering {
    missing_last(a.meta.date_value, b.meta.date_value, |x, y| y.cmp(&x))
}

fn missing_last<T: Copy>(a: Option<T>, b: Option<T>, cmp: impl Fn(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// Case-folded comparison first so "alpha" and "Beta" interleave the way a
// collator would, raw text breaks the tie.
fn compare_names(a: &AnalyzedRow, b: &AnalyzedRow) -> Ordering {
    let left = a.row.app.name.as_str();
    let right = b.row.app.name.as_str();
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| left.cmp(right))
}
