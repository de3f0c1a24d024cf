//! Dataset normalization.
//!
//! Turns the loosely structured `{ apps: [...] }` document into flat
//! `(app, track)` rows. Structural defects are reported as human readable
//! warnings and the offending element is skipped; normalization itself never
//! fails.

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Track every other component falls back to.
pub const STABLE_TRACK: &str = "stable";

/// One release descriptor ("latest") as published for a track.
///
/// Every field is optional; absence is a displayable state, not an error.
/// `code` keeps the raw JSON value so the analyzer decides how to coerce it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackEntry {
    pub version: Option<String>,
    pub code: Option<Value>,
    pub date: Option<String>,
    pub url: Option<String>,
    pub download: Option<String>,
    pub notes: Option<String>,
}

impl TrackEntry {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            version: text_field(object, "version"),
            code: object.get("code").filter(|value| !value.is_null()).cloned(),
            date: text_field(object, "date"),
            url: text_field(object, "url"),
            download: text_field(object, "download"),
            notes: text_field(object, "notes"),
        }
    }
}

/// A validated app with its tracks keyed by lowercased track name.
#[derive(Debug, Clone, PartialEq)]
pub struct AppRecord {
    pub id: String,
    pub name: String,
    pub tracks: IndexMap<String, TrackEntry>,
}

impl AppRecord {
    pub fn track(&self, key: &str) -> Option<&TrackEntry> {
        self.tracks.get(key)
    }
}

/// The join of one app with one of its tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub app: Arc<AppRecord>,
    pub track_key: String,
    pub latest: TrackEntry,
}

/// Entry for app pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDataset {
    pub rows: Vec<Row>,
    pub apps: Vec<AppSummary>,
    pub warnings: Vec<String>,
}

pub fn normalize_dataset(raw: &Value) -> NormalizedDataset {
    let mut out = NormalizedDataset::default();
    let Some(apps) = raw.get("apps").and_then(Value::as_array) else {
        out.warnings
            .push("Dataset field \"apps\" is missing or not an array.".to_string());
        return out;
    };

    let mut seen_ids = HashSet::new();
    for (index, element) in apps.iter().enumerate() {
        let Some(object) = element.as_object() else {
            out.warnings
                .push(format!("App at index {index} is not an object."));
            continue;
        };

        let Some(id) = text_field(object, "id").filter(|id| !id.trim().is_empty()) else {
            out.warnings
                .push(format!("App entry {index} is missing an id."));
            continue;
        };

        let Some(raw_tracks) = object
            .get("tracks")
            .and_then(Value::as_object)
            .filter(|tracks| !tracks.is_empty())
        else {
            out.warnings.push(format!("App \"{id}\" has no tracks."));
            continue;
        };

        let mut tracks = IndexMap::new();
        let mut track_warnings = Vec::new();
        for (key, value) in raw_tracks {
            let Some(entry) = value.as_object() else {
                tracing::debug!(app = %id, track = %key, "skipping non-object track entry");
                continue;
            };
            // Keys are case-insensitive; the first spelling in document order wins.
            match tracks.entry(key.to_lowercase()) {
                Entry::Occupied(existing) => {
                    track_warnings.push(format!(
                        "App \"{id}\" has duplicate track \"{}\"; \"{key}\" ignored.",
                        existing.key()
                    ));
                }
                Entry::Vacant(slot) => {
                    slot.insert(TrackEntry::from_object(entry));
                }
            }
        }
        if tracks.is_empty() {
            out.warnings
                .push(format!("App \"{id}\" has empty track metadata."));
            continue;
        }

        if !seen_ids.insert(id.clone()) {
            out.warnings
                .push(format!("Duplicate app id \"{id}\" ignored."));
            continue;
        }
        out.warnings.extend(track_warnings);

        let name = text_field(object, "name")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| id.clone());
        let app = Arc::new(AppRecord {
            id: id.clone(),
            name: name.clone(),
            tracks,
        });
        for (track_key, latest) in &app.tracks {
            out.rows.push(Row {
                app: Arc::clone(&app),
                track_key: track_key.clone(),
                latest: latest.clone(),
            });
        }
        out.apps.push(AppSummary { id, name });
    }
    out
}

/// Read a scalar field as text. Strings are kept verbatim, numbers and
/// booleans are rendered the way a JSON consumer would print them.
fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn flattens_apps_into_rows() {
        let raw = json!({
            "apps": [
                {
                    "id": "a1",
                    "name": "Alpha",
                    "tracks": {
                        "stable": { "version": "1.2.0", "code": 120, "date": "2024-01-01" },
                        "Beta": { "version": "1.3.0-beta", "code": 130 }
                    }
                },
                { "id": "b2", "tracks": { "stable": { "version": "0.1" } } }
            ]
        });
        let dataset = normalize_dataset(&raw);
        assert!(dataset.warnings.is_empty());
        let keys: Vec<(&str, &str)> = dataset
            .rows
            .iter()
            .map(|row| (row.app.id.as_str(), row.track_key.as_str()))
            .collect();
        assert_eq!(keys, vec![("a1", "stable"), ("a1", "beta"), ("b2", "stable")]);
        assert_eq!(
            dataset.apps,
            vec![
                AppSummary {
                    id: "a1".to_string(),
                    name: "Alpha".to_string()
                },
                AppSummary {
                    id: "b2".to_string(),
                    name: "b2".to_string()
                },
            ]
        );
        assert_eq!(dataset.rows[0].latest.code, Some(json!(120)));
    }

    #[test]
    fn apps_not_an_array_yields_single_warning() {
        let dataset = normalize_dataset(&json!({ "apps": { "id": "a1" } }));
        assert!(dataset.rows.is_empty());
        assert_eq!(dataset.warnings.len(), 1);

        let dataset = normalize_dataset(&json!("nonsense"));
        assert_eq!(dataset.warnings.len(), 1);
    }

    #[test]
    fn rejected_apps_emit_one_warning_each() {
        let raw = json!({
            "apps": [
                "not-an-app",
                { "name": "No id", "tracks": { "stable": {} } },
                { "id": "   ", "tracks": { "stable": {} } },
                { "id": "no-tracks" },
                { "id": "array-tracks", "tracks": [] },
                { "id": "junk-tracks", "tracks": { "stable": 5, "beta": "x" } },
                { "id": "ok", "tracks": { "stable": {}, "beta": null } },
                { "id": "ok", "tracks": { "stable": {} } }
            ]
        });
        let dataset = normalize_dataset(&raw);
        assert_eq!(
            dataset.warnings,
            vec![
                "App at index 0 is not an object.".to_string(),
                "App entry 1 is missing an id.".to_string(),
                "App entry 2 is missing an id.".to_string(),
                "App \"no-tracks\" has no tracks.".to_string(),
                "App \"array-tracks\" has no tracks.".to_string(),
                "App \"junk-tracks\" has empty track metadata.".to_string(),
                "Duplicate app id \"ok\" ignored.".to_string(),
            ]
        );
        assert_eq!(dataset.rows.len(), 1);
        assert_eq!(dataset.rows[0].track_key, "stable");
    }

    #[test]
    fn case_colliding_tracks_keep_first_and_warn() {
        let raw = json!({
            "apps": [{
                "id": "a1",
                "tracks": {
                    "beta": { "code": 130 },
                    "Beta": { "code": 131 },
                    "stable": { "code": 120 }
                }
            }]
        });
        let dataset = normalize_dataset(&raw);
        assert_eq!(
            dataset.warnings,
            vec!["App \"a1\" has duplicate track \"beta\"; \"Beta\" ignored.".to_string()]
        );
        let rows: Vec<(&str, Option<Value>)> = dataset
            .rows
            .iter()
            .map(|row| (row.track_key.as_str(), row.latest.code.clone()))
            .collect();
        assert_eq!(
            rows,
            vec![("beta", Some(json!(130))), ("stable", Some(json!(120)))]
        );
    }

    #[test]
    fn scalar_fields_are_read_leniently() {
        let raw = json!({
            "apps": [{
                "id": 42,
                "name": "",
                "tracks": { "stable": { "version": 3, "code": "17", "url": null, "notes": ["x"] } }
            }]
        });
        let dataset = normalize_dataset(&raw);
        let row = &dataset.rows[0];
        assert_eq!(row.app.id, "42");
        assert_eq!(row.app.name, "42");
        assert_eq!(row.latest.version.as_deref(), Some("3"));
        assert_eq!(row.latest.code, Some(json!("17")));
        assert_eq!(row.latest.url, None);
        assert_eq!(row.latest.notes, None);
    }
}
