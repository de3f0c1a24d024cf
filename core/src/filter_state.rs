//! Canonical interactive filter state.
//!
//! State arrives from several provenance layers (hard defaults, live control
//! values, persisted storage, the URL). [`normalize`] folds them into one fully
//! populated [`FilterState`]; [`query_pairs`] and [`url_query_string`] produce
//! the minimal canonical representation written back to storage and URLs.

use crate::config::PipelineConfig;
use crate::sort::SortKey;
use serde::Deserialize;
use serde::Serialize;
use url::form_urlencoded;

pub const KEY_Q: &str = "q";
pub const KEY_TRACK: &str = "track";
pub const KEY_SORT: &str = "sort";
pub const KEY_ISSUES: &str = "issues";
pub const KEY_STALE: &str = "stale";
pub const KEY_MISSING: &str = "missing";
pub const KEY_FUTURE: &str = "future";

/// Keys owned by the interactive state, in canonical order.
pub const STATE_KEYS: [&str; 7] = [
    KEY_Q,
    KEY_TRACK,
    KEY_SORT,
    KEY_ISSUES,
    KEY_STALE,
    KEY_MISSING,
    KEY_FUTURE,
];

/// Machine endpoint parameters; never carried by interactive URLs.
pub const ENDPOINT_KEYS: [&str; 3] = ["format", "app", "latest"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackFilter {
    All,
    #[default]
    Stable,
    Beta,
}

impl TrackFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackFilter::All => "all",
            TrackFilter::Stable => "stable",
            TrackFilter::Beta => "beta",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "all" => Some(TrackFilter::All),
            "stable" => Some(TrackFilter::Stable),
            "beta" => Some(TrackFilter::Beta),
            _ => None,
        }
    }

    /// Whether a row on `track_key` passes this filter.
    pub fn admits(self, track_key: &str) -> bool {
        match self {
            TrackFilter::All => true,
            TrackFilter::Stable | TrackFilter::Beta => track_key == self.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggles {
    pub issues: bool,
    pub stale: bool,
    pub missing: bool,
    pub future: bool,
}

/// Fully populated interactive state. Construct through [`normalize`] so every
/// field is within its domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    pub q: String,
    pub track: TrackFilter,
    pub sort: SortKey,
    #[serde(flatten)]
    pub toggles: Toggles,
}

/// One provenance layer. Absent fields defer to earlier layers; `track` and
/// `sort` stay unvalidated text until [`normalize`] checks them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PartialFilterState {
    pub q: Option<String>,
    pub track: Option<String>,
    pub sort: Option<String>,
    pub issues: Option<bool>,
    pub stale: Option<bool>,
    pub missing: Option<bool>,
    pub future: Option<bool>,
}

impl PartialFilterState {
    /// Build a layer from decoded key/value pairs. Unrelated keys are ignored
    /// and unparsable booleans leave the field unset.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut layer = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                KEY_Q => layer.q = Some(value.to_string()),
                KEY_TRACK => layer.track = Some(value.to_string()),
                KEY_SORT => layer.sort = Some(value.to_string()),
                KEY_ISSUES => layer.issues = parse_flag(value).or(layer.issues),
                KEY_STALE => layer.stale = parse_flag(value).or(layer.stale),
                KEY_MISSING => layer.missing = parse_flag(value).or(layer.missing),
                KEY_FUTURE => layer.future = parse_flag(value).or(layer.future),
                _ => {}
            }
        }
        layer
    }

    /// Build a layer from a URL query string, with or without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(form_urlencoded::parse(query.as_bytes()))
    }
}

impl From<&FilterState> for PartialFilterState {
    fn from(state: &FilterState) -> Self {
        Self {
            q: Some(state.q.clone()),
            track: Some(state.track.as_str().to_string()),
            sort: Some(state.sort.as_str().to_string()),
            issues: Some(state.toggles.issues),
            stale: Some(state.toggles.stale),
            missing: Some(state.toggles.missing),
            future: Some(state.toggles.future),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Fold provenance layers, later layers winning field by field.
///
/// Unrecognized `track`/`sort` values are dropped in favour of the running
/// value. The search text is trimmed and capped at `query_max_chars`
/// characters.
pub fn normalize(sources: &[PartialFilterState], config: &PipelineConfig) -> FilterState {
    let mut state = FilterState::default();
    for source in sources {
        if let Some(q) = &source.q {
            state.q = q.clone();
        }
        if let Some(track) = source.track.as_deref().and_then(TrackFilter::parse) {
            state.track = track;
        }
        if let Some(sort) = source.sort.as_deref().and_then(SortKey::parse) {
            state.sort = sort;
        }
        let toggles = &mut state.toggles;
        toggles.issues = source.issues.unwrap_or(toggles.issues);
        toggles.stale = source.stale.unwrap_or(toggles.stale);
        toggles.missing = source.missing.unwrap_or(toggles.missing);
        toggles.future = source.future.unwrap_or(toggles.future);
    }
    // The cut may end on a space.
    let capped: String = state.q.trim().chars().take(config.query_max_chars).collect();
    state.q = capped.trim_end().to_string();
    state
}

/// Canonical key/value pairs for `state`, omitting every default field.
pub fn query_pairs(state: &FilterState) -> Vec<(&'static str, String)> {
    let defaults = FilterState::default();
    let mut pairs = Vec::new();
    if state.q != defaults.q {
        pairs.push((KEY_Q, state.q.clone()));
    }
    if state.track != defaults.track {
        pairs.push((KEY_TRACK, state.track.as_str().to_string()));
    }
    if state.sort != defaults.sort {
        pairs.push((KEY_SORT, state.sort.as_str().to_string()));
    }
    let toggles = [
        (KEY_ISSUES, state.toggles.issues),
        (KEY_STALE, state.toggles.stale),
        (KEY_MISSING, state.toggles.missing),
        (KEY_FUTURE, state.toggles.future),
    ];
    for (key, enabled) in toggles {
        if enabled {
            pairs.push((key, "1".to_string()));
        }
    }
    pairs
}

/// Rewrite `existing_query` so it carries exactly `state`.
///
/// Unrelated parameters survive in their original order; endpoint parameters
/// and stale state keys are dropped. Returns the query without a leading `?`.
pub fn url_query_string(state: &FilterState, existing_query: &str) -> String {
    let existing_query = existing_query.strip_prefix('?').unwrap_or(existing_query);
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(existing_query.as_bytes()) {
        let name: &str = &key;
        if ENDPOINT_KEYS.contains(&name) || STATE_KEYS.contains(&name) {
            continue;
        }
        serializer.append_pair(name, &value);
    }
    for (key, value) in query_pairs(state) {
        serializer.append_pair(key, &value);
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn layer(query: &str) -> PartialFilterState {
        PartialFilterState::from_query(query)
    }

    #[test]
    fn empty_sources_yield_defaults() {
        let state = normalize(&[], &PipelineConfig::default());
        assert_eq!(state, FilterState::default());
        assert_eq!(state.track, TrackFilter::Stable);
        assert_eq!(state.sort, SortKey::CodeDesc);
        assert!(query_pairs(&state).is_empty());
    }

    #[test]
    fn later_layers_win_field_by_field() {
        let controls = PartialFilterState {
            q: Some("alpha".to_string()),
            track: Some("all".to_string()),
            issues: Some(true),
            ..Default::default()
        };
        let persisted = layer("sort=name_asc&issues=0");
        let url = layer("?track=beta&stale=yes");
        let state = normalize(&[controls, persisted, url], &PipelineConfig::default());
        assert_eq!(
            state,
            FilterState {
                q: "alpha".to_string(),
                track: TrackFilter::Beta,
                sort: SortKey::NameAsc,
                toggles: Toggles {
                    stale: true,
                    ..Default::default()
                },
            }
        );
    }

    #[test]
    fn invalid_enums_keep_running_value() {
        let state = normalize(
            &[layer("track=all&sort=date_asc"), layer("track=nightly&sort=random")],
            &PipelineConfig::default(),
        );
        assert_eq!(state.track, TrackFilter::All);
        assert_eq!(state.sort, SortKey::DateAsc);

        let state = normalize(&[layer("track=nightly")], &PipelineConfig::default());
        assert_eq!(state.track, TrackFilter::Stable);
    }

    #[test]
    fn unparsable_flags_are_ignored() {
        let state = normalize(
            &[layer("issues=1"), layer("issues=maybe")],
            &PipelineConfig::default(),
        );
        assert!(state.toggles.issues);
    }

    #[test]
    fn query_is_capped_in_characters() {
        let long = "é".repeat(250);
        let state = normalize(
            &[PartialFilterState {
                q: Some(format!("  {long}  ")),
                ..Default::default()
            }],
            &PipelineConfig::default(),
        );
        assert_eq!(state.q.chars().count(), 200);
    }

    #[test]
    fn capped_query_drops_trailing_space_and_round_trips() {
        let config = PipelineConfig::default();
        let q = format!("{} b", "a".repeat(199));
        let state = normalize(
            &[PartialFilterState {
                q: Some(q),
                ..Default::default()
            }],
            &config,
        );
        assert_eq!(state.q, "a".repeat(199));
        let reparsed = normalize(&[layer(&url_query_string(&state, ""))], &config);
        assert_eq!(reparsed, state);
    }

    #[test]
    fn url_drops_endpoint_params_and_defaults() {
        let state = FilterState {
            q: "code>5 a&b".to_string(),
            track: TrackFilter::All,
            sort: SortKey::CodeDesc,
            toggles: Toggles {
                missing: true,
                ..Default::default()
            },
        };
        let query = url_query_string(&state, "?format=json&app=a1&latest=1&theme=dark&q=old&sort=name_asc");
        assert_eq!(query, "theme=dark&q=code%3E5+a%26b&track=all&missing=1");
    }

    #[test]
    fn url_round_trip_is_idempotent() {
        let config = PipelineConfig::default();
        let states = [
            FilterState::default(),
            normalize(&[layer("q=status:issues&track=beta&sort=issues_first&future=1")], &config),
            normalize(&[layer("track=all&issues=1&stale=1&missing=1")], &config),
        ];
        for state in states {
            let reparsed = normalize(&[layer(&url_query_string(&state, ""))], &config);
            assert_eq!(reparsed, state);
        }
    }

    #[test]
    fn controls_layer_deserializes_from_partial_config() {
        let layer: PartialFilterState =
            serde_json::from_str(r#"{"track": "all", "stale": true}"#).unwrap();
        assert_eq!(layer.track.as_deref(), Some("all"));
        assert_eq!(layer.stale, Some(true));
        assert_eq!(layer.q, None);
    }
}
