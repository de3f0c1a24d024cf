//! Per-row health analysis.
//!
//! Parses the loosely typed release descriptor of every row (code, date,
//! links) and derives flags, toned badges, a single severity and the lowercase
//! text the query engine searches. Field defects never fail: they turn into an
//! "absent" display state and a badge.

use crate::config::PipelineConfig;
use crate::dataset::Row;
use crate::dataset::STABLE_TRACK;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

pub const DAY_MS: i64 = 86_400_000;

/// Display text for an absent value.
pub const MISSING_DISPLAY: &str = "—";

const BLOCKED_LINK_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:"];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Error,
    Warn,
    Info,
}

impl Tone {
    pub fn rank(self) -> u8 {
        match self {
            Tone::Error => 0,
            Tone::Warn => 1,
            Tone::Info => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warn,
    Info,
    Ok,
}

impl Severity {
    pub fn rank(self) -> u8 {
        match self {
            Severity::Error => 0,
            Severity::Warn => 1,
            Severity::Info => 2,
            Severity::Ok => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Ok => "ok",
        }
    }

    fn from_tone(tone: Tone) -> Self {
        match tone {
            Tone::Error => Severity::Error,
            Tone::Warn => Severity::Warn,
            Tone::Info => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: String,
    pub label: String,
    pub tone: Tone,
}

impl Badge {
    fn new(id: &str, label: impl Into<String>, tone: Tone) -> Self {
        Self {
            id: id.to_string(),
            label: label.into(),
            tone,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowFlags {
    pub stale: bool,
    pub future: bool,
    pub missing_links: bool,
    pub missing_version: bool,
    pub missing_code: bool,
    pub missing_date: bool,
    pub invalid_date: bool,
    pub has_notes: bool,
    pub has_download: bool,
    pub has_url: bool,
    pub behind_stable: bool,
    pub ahead_of_stable: bool,
}

impl RowFlags {
    /// True when any required piece of the descriptor is absent.
    pub fn any_missing(&self) -> bool {
        self.missing_version || self.missing_code || self.missing_date || self.missing_links
    }
}

/// Derived, immutable analysis of one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowMeta {
    pub version_text: String,
    pub code: Option<f64>,
    pub code_label: String,
    pub date_value: Option<i64>,
    pub date_display: String,
    pub date_title: String,
    pub age_days: Option<i64>,
    /// Release link that passed sanitization
    pub safe_url: Option<String>,
    /// Download link that passed sanitization
    pub safe_download: Option<String>,
    pub badges: Vec<Badge>,
    pub flags: RowFlags,
    pub severity: Severity,
    pub has_issues: bool,
    pub search_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedRow {
    pub row: Row,
    pub meta: RowMeta,
}

enum DateState {
    Missing,
    Invalid,
    Valid { epoch_ms: i64, age_days: i64 },
}

/// Coerce a raw JSON value into a finite number.
///
/// Numbers and numeric strings are accepted; blanks, non-numeric text,
/// non-finite results and every other JSON type are absent.
pub fn to_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => parse_number_text(text)?,
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => return None,
    };
    number.is_finite().then_some(number)
}

pub(crate) fn parse_number_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

/// Render a number the way the dataset wrote it: integral values without a
/// fractional part.
pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        format!("{number}")
    }
}

/// Parse an ISO-ish release date into epoch milliseconds (UTC).
pub fn parse_release_date(raw: &str) -> Option<i64> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.timestamp_millis());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(text, format) {
            return parsed
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc().timestamp_millis());
        }
    }
    None
}

/// Return the link only when it is safe to hand to a renderer.
///
/// Blank strings and script-capable schemes are treated as absent. Whitespace
/// and control characters are ignored while checking the scheme, matching how
/// browsers resolve `java\tscript:`.
pub fn sanitize_link(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let compact: String = trimmed
        .chars()
        .filter(|ch| !ch.is_whitespace() && !ch.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    if BLOCKED_LINK_SCHEMES
        .iter()
        .any(|scheme| compact.starts_with(scheme))
    {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn analyze_rows(rows: Vec<Row>, now: DateTime<Utc>, config: &PipelineConfig) -> Vec<AnalyzedRow> {
    let now_ms = now.timestamp_millis();
    rows.into_iter()
        .map(|row| {
            let stable_code = row
                .app
                .track(STABLE_TRACK)
                .and_then(|stable| stable.code.as_ref())
                .and_then(to_number);
            let meta = analyze_row(&row, stable_code, now_ms, config);
            AnalyzedRow { row, meta }
        })
        .collect()
}

pub fn analyze_row(
    row: &Row,
    stable_code: Option<f64>,
    now_ms: i64,
    config: &PipelineConfig,
) -> RowMeta {
    let latest = &row.latest;
    let mut flags = RowFlags::default();
    let mut badges = Vec::new();

    let version_text = latest
        .version
        .as_deref()
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .map(str::to_string);
    flags.missing_version = version_text.is_none();
    let version_text = version_text.unwrap_or_else(|| MISSING_DISPLAY.to_string());

    let code = latest.code.as_ref().and_then(to_number);
    flags.missing_code = code.is_none();
    let code_label = code.map_or_else(|| MISSING_DISPLAY.to_string(), format_number);

    let raw_date = latest.date.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let date_state = match raw_date {
        None => DateState::Missing,
        Some(text) => match parse_release_date(text) {
            None => DateState::Invalid,
            Some(epoch_ms) => DateState::Valid {
                epoch_ms,
                age_days: round_days(now_ms - epoch_ms),
            },
        },
    };
    let (date_value, age_days, date_display, date_title) = match date_state {
        DateState::Missing => {
            flags.missing_date = true;
            (None, None, MISSING_DISPLAY.to_string(), "No release date".to_string())
        }
        DateState::Invalid => {
            flags.invalid_date = true;
            let raw = raw_date.unwrap_or_default();
            (
                None,
                None,
                MISSING_DISPLAY.to_string(),
                format!("Unparsable date: {raw}"),
            )
        }
        DateState::Valid { epoch_ms, age_days } => {
            flags.stale = age_days > config.stale_after_days;
            flags.future = age_days < -config.future_grace_days;
            let display = DateTime::<Utc>::from_timestamp_millis(epoch_ms)
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| MISSING_DISPLAY.to_string());
            let raw = raw_date.unwrap_or_default();
            let title = if age_days >= 0 {
                format!("{raw} ({age_days}d ago)")
            } else {
                format!("{raw} (in {}d)", -age_days)
            };
            (Some(epoch_ms), Some(age_days), display, title)
        }
    };

    let safe_url = sanitize_link(latest.url.as_deref());
    let safe_download = sanitize_link(latest.download.as_deref());
    flags.has_url = safe_url.is_some();
    flags.has_download = safe_download.is_some();
    flags.has_notes = latest
        .notes
        .as_deref()
        .is_some_and(|notes| !notes.trim().is_empty());

    if flags.missing_version {
        badges.push(Badge::new("missing-version", "Missing version", Tone::Error));
    }
    match code {
        None => badges.push(Badge::new("missing-code", "Missing code", Tone::Error)),
        Some(value) if value <= 0.0 => {
            badges.push(Badge::new("code-nonpositive", "Code <= 0", Tone::Warn));
        }
        Some(_) => {}
    }
    if flags.missing_date {
        badges.push(Badge::new("missing-date", "Missing date", Tone::Warn));
    } else if flags.invalid_date {
        badges.push(Badge::new("invalid-date", "Invalid date", Tone::Warn));
    }
    if let Some(age) = age_days {
        if flags.stale {
            badges.push(Badge::new("stale", format!("Stale ({age}d)"), Tone::Warn));
        }
        if flags.future {
            badges.push(Badge::new("future", format!("Future ({}d)", -age), Tone::Warn));
        }
    }
    match (flags.has_url, flags.has_download) {
        (false, false) => {
            flags.missing_links = true;
            badges.push(Badge::new("missing-links", "Missing links", Tone::Warn));
        }
        (true, false) => badges.push(Badge::new("no-download", "No download link", Tone::Info)),
        (false, true) => badges.push(Badge::new("no-release", "No release link", Tone::Info)),
        (true, true) => {}
    }
    if flags.has_notes {
        badges.push(Badge::new("notes", "Notes available", Tone::Info));
    }
    let stable_comparison = match (code, stable_code) {
        (Some(own), Some(stable)) if row.track_key != STABLE_TRACK => Some((own, stable)),
        _ => None,
    };
    if let Some((own, stable)) = stable_comparison {
        if own < stable {
            flags.behind_stable = true;
            badges.push(Badge::new("behind-stable", "Behind stable", Tone::Warn));
        } else if own > stable {
            flags.ahead_of_stable = true;
            badges.push(Badge::new("ahead-stable", "Ahead of stable", Tone::Info));
        }
    }

    badges.sort_by_key(|badge| badge.tone.rank());
    let severity = badges
        .iter()
        .map(|badge| badge.tone)
        .min_by_key(|tone| tone.rank())
        .map_or(Severity::Ok, Severity::from_tone);
    let has_issues = matches!(severity, Severity::Error | Severity::Warn);

    let search_text = [
        row.app.id.as_str(),
        row.app.name.as_str(),
        row.track_key.as_str(),
        version_text.as_str(),
        code_label.as_str(),
        latest.date.as_deref().unwrap_or_default(),
        latest.notes.as_deref().unwrap_or_default(),
        latest.url.as_deref().unwrap_or_default(),
        latest.download.as_deref().unwrap_or_default(),
    ]
    .iter()
    .filter(|part| !part.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase();

    RowMeta {
        version_text,
        code,
        code_label,
        date_value,
        date_display,
        date_title,
        age_days,
        safe_url,
        safe_download,
        badges,
        flags,
        severity,
        has_issues,
        search_text,
    }
}

/// Whole days between two instants, rounding half away towards the future
/// the way `Math.round` does.
fn round_days(delta_ms: i64) -> i64 {
    (delta_ms as f64 / DAY_MS as f64 + 0.5).floor() as i64
}
