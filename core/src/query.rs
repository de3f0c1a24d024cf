//! Structured search over analyzed rows.
//!
//! A query is a whitespace separated token stream. Tokens shaped like
//! `key<op>value` become typed filters, everything else is a lowercase free
//! text term. Parsing never fails: a token that does not look like a filter is
//! simply searched for as text.

use crate::analyzer::AnalyzedRow;
use crate::analyzer::DAY_MS;
use crate::analyzer::Severity;
use crate::analyzer::parse_number_text;
use crate::analyzer::parse_release_date;

/// Operators in the order the tokenizer tries them. `<=`/`>=` must be tried
/// before `=`, `<` and `>`.
const OPERATORS: &[(&str, Op)] = &[
    (":", Op::Colon),
    ("<=", Op::Le),
    (">=", Op::Ge),
    ("=", Op::Eq),
    ("<", Op::Lt),
    (">", Op::Gt),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Colon,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Colon => ":",
            Op::Eq => "=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }

    fn compare<T: PartialOrd>(self, left: T, right: T) -> bool {
        match self {
            Op::Colon | Op::Eq => left == right,
            Op::Lt => left < right,
            Op::Le => left <= right,
            Op::Gt => left > right,
            Op::Ge => left >= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKey {
    Id,
    Name,
    Track,
    Status,
    Has,
    Missing,
    Code,
    Date,
    /// Any other key; matched as a substring of the whole token.
    Unknown(String),
}

impl FilterKey {
    fn parse(key: &str) -> Self {
        match key {
            "id" | "app" => FilterKey::Id,
            "name" => FilterKey::Name,
            "track" => FilterKey::Track,
            "status" => FilterKey::Status,
            "has" => FilterKey::Has,
            "missing" => FilterKey::Missing,
            "code" => FilterKey::Code,
            "date" | "released" => FilterKey::Date,
            other => FilterKey::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub key: FilterKey,
    pub op: Op,
    pub value: String,
    /// Lowercased source token, used by the unknown-key fallback.
    pub raw: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryAst {
    pub terms: Vec<String>,
    pub filters: Vec<Filter>,
}

impl QueryAst {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.filters.is_empty()
    }

    /// True iff every term and every filter matches.
    pub fn matches(&self, row: &AnalyzedRow) -> bool {
        let haystack = row.meta.search_text.as_str();
        self.terms.iter().all(|term| haystack.contains(term.as_str()))
            && self.filters.iter().all(|filter| filter.matches(row))
    }
}

pub fn parse_query(input: &str) -> QueryAst {
    let mut ast = QueryAst::default();
    for token in input.split_whitespace() {
        match parse_filter(token) {
            Some(filter) => ast.filters.push(filter),
            None => ast.terms.push(token.to_lowercase()),
        }
    }
    ast
}

fn parse_filter(token: &str) -> Option<Filter> {
    let key_len = token
        .find(|ch: char| !(ch.is_ascii_alphabetic() || ch == '_'))
        .unwrap_or(token.len());
    if key_len == 0 {
        return None;
    }
    let (key, rest) = token.split_at(key_len);
    // An operator that leaves nothing behind yields to the next one, so
    // `code<=` reads as `<` with value `=`.
    let (op, value) = OPERATORS.iter().find_map(|(symbol, op)| {
        rest.strip_prefix(symbol)
            .filter(|value| !value.is_empty())
            .map(|value| (*op, value))
    })?;
    Some(Filter {
        key: FilterKey::parse(&key.to_ascii_lowercase()),
        op,
        value: value.to_string(),
        raw: token.to_lowercase(),
    })
}

impl Filter {
    pub fn matches(&self, row: &AnalyzedRow) -> bool {
        let meta = &row.meta;
        let flags = &meta.flags;
        let value = self.value.to_lowercase();
        match &self.key {
            FilterKey::Id => self.text_match(&row.row.app.id, &value),
            FilterKey::Name => self.text_match(&row.row.app.name, &value),
            // Track is a closed set of names: always exact, whatever the operator.
            FilterKey::Track => row.row.track_key == value,
            FilterKey::Status => match value.as_str() {
                "issues" => meta.has_issues,
                "error" => meta.severity == Severity::Error,
                "warn" | "warning" => meta.severity == Severity::Warn,
                "info" => meta.severity == Severity::Info,
                "ok" | "healthy" => meta.severity == Severity::Ok,
                "stale" => flags.stale,
                "future" => flags.future,
                "missing" => flags.any_missing(),
                _ => false,
            },
            FilterKey::Has => match value.as_str() {
                "notes" => flags.has_notes,
                "download" => flags.has_download,
                "url" | "release" => flags.has_url,
                _ => false,
            },
            FilterKey::Missing => match value.as_str() {
                "notes" => !flags.has_notes,
                "download" => !flags.has_download,
                "url" | "release" => !flags.has_url,
                "date" => meta.date_value.is_none(),
                _ => false,
            },
            FilterKey::Code => match (meta.code, parse_number_text(&value)) {
                (Some(code), Some(wanted)) => self.op.compare(code, wanted),
                _ => false,
            },
            // Date formats are case-sensitive (`T` separator), so parse the value as typed.
            FilterKey::Date => match (meta.date_value, parse_release_date(&self.value)) {
                (Some(date), Some(wanted)) => match self.op {
                    Op::Colon | Op::Eq => (date - wanted).abs() < DAY_MS,
                    op => op.compare(date, wanted),
                },
                _ => false,
            },
            FilterKey::Unknown(_) => meta.search_text.contains(self.raw.as_str()),
        }
    }

    fn text_match(&self, field: &str, value: &str) -> bool {
        let field = field.to_lowercase();
        if self.op == Op::Eq {
            field == value
        } else {
            field.contains(value)
        }
    }
}
