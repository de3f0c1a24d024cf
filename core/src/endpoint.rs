//! Machine endpoints.
//!
//! Serializes the raw dataset for a request descriptor. This path reads the
//! raw `tracks` objects directly and never goes through normalization,
//! analysis or the interactive filters, so clients see exactly what the
//! dataset publishes.
//!
//! Apps that are not objects, or that carry no scalar `id`, are skipped.

use crate::analyzer::format_number;
use crate::config::CodeEndpointMode;
use crate::dataset::STABLE_TRACK;
use crate::error::Result;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use url::form_urlencoded;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointFormat {
    Json,
    Txt,
    Ini,
    Code,
}

impl EndpointFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(EndpointFormat::Json),
            "txt" => Some(EndpointFormat::Txt),
            "ini" => Some(EndpointFormat::Ini),
            "code" => Some(EndpointFormat::Code),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointFormat::Json => "json",
            EndpointFormat::Txt => "txt",
            EndpointFormat::Ini => "ini",
            EndpointFormat::Code => "code",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRequest {
    pub format: EndpointFormat,
    pub app_id: Option<String>,
    pub track_key: String,
    pub latest_only: bool,
}

impl EndpointRequest {
    pub fn new(format: EndpointFormat) -> Self {
        Self {
            format,
            app_id: None,
            track_key: STABLE_TRACK.to_string(),
            latest_only: false,
        }
    }

    /// Decode a request from a URL query string.
    ///
    /// Returns `None` when `format` is absent or not a machine format, which
    /// selects the interactive view instead.
    pub fn from_query(query: &str) -> Option<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut format = None;
        let mut app_id = None;
        let mut track_key = None;
        let mut latest_only = false;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "format" => format = Some(value.into_owned()),
                "app" => app_id = Some(value.into_owned()).filter(|id| !id.is_empty()),
                "track" => {
                    track_key = Some(value.to_lowercase()).filter(|track| !track.is_empty());
                }
                "latest" => latest_only = value == "1",
                _ => {}
            }
        }
        let format = EndpointFormat::parse(format.as_deref()?)?;
        Some(Self {
            format,
            app_id,
            track_key: track_key.unwrap_or_else(|| STABLE_TRACK.to_string()),
            latest_only,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResponse {
    pub body: String,
    /// Suggested document or file name
    pub title: String,
    pub content_type: &'static str,
}

impl EndpointResponse {
    fn text(body: String, title: String) -> Self {
        Self {
            body,
            title,
            content_type: CONTENT_TYPE_TEXT,
        }
    }

    fn json(value: &Value, title: String) -> Result<Self> {
        Ok(Self {
            body: serde_json::to_string_pretty(value)?,
            title,
            content_type: CONTENT_TYPE_JSON,
        })
    }
}

/// An app element of the raw dataset together with its display id.
struct RawApp<'a> {
    id: String,
    object: &'a Map<String, Value>,
}

impl<'a> RawApp<'a> {
    /// `tracks[track]`, else `tracks["stable"]`; only object entries count.
    fn pick_latest(&self, track: &str) -> Option<(&'a str, &'a Map<String, Value>)> {
        let tracks = self.object.get("tracks")?.as_object()?;
        let lookup = |key: &str| {
            tracks
                .get_key_value(key)
                .and_then(|(name, entry)| entry.as_object().map(|entry| (name.as_str(), entry)))
        };
        lookup(track).or_else(|| lookup(STABLE_TRACK))
    }

    fn name(&self) -> String {
        self.object
            .get("name")
            .map(|name| display(Some(name), ""))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.id.clone())
    }
}

pub fn render_endpoint(
    raw: &Value,
    request: &EndpointRequest,
    code_mode: CodeEndpointMode,
) -> Result<EndpointResponse> {
    let apps = raw_apps(raw);
    match request.format {
        EndpointFormat::Code => Ok(render_code(&apps, request, code_mode)),
        EndpointFormat::Txt | EndpointFormat::Ini => Ok(render_text(&apps, request)),
        EndpointFormat::Json => render_json(raw, &apps, request),
    }
}

fn raw_apps(raw: &Value) -> Vec<RawApp<'_>> {
    raw.get("apps")
        .and_then(Value::as_array)
        .map(|apps| {
            apps.iter()
                .filter_map(Value::as_object)
                .filter_map(|object| {
                    let id = scalar_text(object.get("id")?)?;
                    Some(RawApp { id, object })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn find_app<'r, 'a>(apps: &'r [RawApp<'a>], id: &str) -> Option<&'r RawApp<'a>> {
    apps.iter().find(|app| app.id == id)
}

fn render_code(apps: &[RawApp<'_>], request: &EndpointRequest, mode: CodeEndpointMode) -> EndpointResponse {
    let field_of = |app: &RawApp<'_>| {
        let latest = app.pick_latest(&request.track_key).map(|(_, entry)| entry);
        match mode {
            CodeEndpointMode::NumericCode => display(latest.and_then(|entry| entry.get("code")), "0"),
            CodeEndpointMode::VersionString => {
                display(latest.and_then(|entry| entry.get("version")), "")
            }
        }
    };
    match &request.app_id {
        None => {
            let body = apps
                .iter()
                .map(|app| format!("{}={}", app.id, field_of(app)))
                .collect::<Vec<_>>()
                .join("\n");
            EndpointResponse::text(body, "versions.txt".to_string())
        }
        Some(app_id) => {
            let body = match (find_app(apps, app_id), mode) {
                (Some(app), _) => field_of(app),
                (None, CodeEndpointMode::NumericCode) => "0".to_string(),
                (None, CodeEndpointMode::VersionString) => String::new(),
            };
            EndpointResponse::text(body, format!("{app_id}.code"))
        }
    }
}

fn render_text(apps: &[RawApp<'_>], request: &EndpointRequest) -> EndpointResponse {
    let format = request.format;
    let extension = format.as_str();
    if let Some(app_id) = &request.app_id {
        let body = match find_app(apps, app_id) {
            Some(app) => text_block(app, request),
            None => format!("error=app_not_found\napp={app_id}\n"),
        };
        return EndpointResponse::text(body, format!("{app_id}.{extension}"));
    }
    if request.latest_only {
        let body = apps
            .iter()
            .map(|app| {
                let latest = app.pick_latest(&request.track_key).map(|(_, entry)| entry);
                format!(
                    "{} {} {}",
                    app.id,
                    display(latest.and_then(|entry| entry.get("code")), "0"),
                    display(latest.and_then(|entry| entry.get("version")), ""),
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        return EndpointResponse::text(body, "latest.txt".to_string());
    }
    let body = apps
        .iter()
        .map(|app| text_block(app, request))
        .collect::<Vec<_>>()
        .join("\n");
    EndpointResponse::text(body, format!("versions.{extension}"))
}

fn text_block(app: &RawApp<'_>, request: &EndpointRequest) -> String {
    let resolved = app.pick_latest(&request.track_key);
    let track = resolved.map_or(STABLE_TRACK, |(name, _)| name);
    let latest = resolved.map(|(_, entry)| entry);
    let field = |key: &str, fallback: &str| display(latest.and_then(|entry| entry.get(key)), fallback);
    let header = match request.format {
        EndpointFormat::Ini => format!("[{}]", app.id),
        EndpointFormat::Txt | EndpointFormat::Json | EndpointFormat::Code => {
            format!("app={}", app.id)
        }
    };
    format!(
        "{header}\nname={}\ntrack={track}\nversion={}\ncode={}\ndate={}\nurl={}\ndownload={}\n",
        app.name(),
        field("version", ""),
        field("code", "0"),
        field("date", ""),
        field("url", ""),
        field("download", ""),
    )
}

fn render_json(raw: &Value, apps: &[RawApp<'_>], request: &EndpointRequest) -> Result<EndpointResponse> {
    if request.latest_only {
        let mut latest = Map::new();
        for app in apps {
            let Some((_, entry)) = app.pick_latest(&request.track_key) else {
                continue;
            };
            let mut compact = Map::new();
            copy_present(entry, "version", &mut compact);
            copy_present(entry, "code", &mut compact);
            latest.insert(app.id.clone(), Value::Object(compact));
        }
        let mut out = dataset_header(raw);
        out.insert("latest".to_string(), Value::Object(latest));
        return EndpointResponse::json(&Value::Object(out), "versions.json".to_string());
    }

    if let Some(app_id) = &request.app_id {
        let Some(app) = find_app(apps, app_id) else {
            let available: Vec<Value> = apps
                .iter()
                .map(|app| app.object.get("id").cloned().unwrap_or(Value::Null))
                .collect();
            let out = json!({
                "error": "app_not_found",
                "app": app_id,
                "available": available,
            });
            return EndpointResponse::json(&out, "versions.json".to_string());
        };
        let resolved = app.pick_latest(&request.track_key);
        let track = resolved.map_or(request.track_key.as_str(), |(name, _)| name);
        let latest = resolved.map_or(Value::Null, |(_, entry)| Value::Object(entry.clone()));
        let mut out = dataset_header(raw);
        out.insert(
            "app".to_string(),
            app.object.get("id").cloned().unwrap_or(Value::Null),
        );
        out.insert("track".to_string(), Value::String(track.to_string()));
        out.insert("latest".to_string(), latest);
        return EndpointResponse::json(&Value::Object(out), format!("{}.json", app.id));
    }

    EndpointResponse::json(raw, "versions.json".to_string())
}

/// `schemaVersion` and `generated`, copied only when the dataset has them.
fn dataset_header(raw: &Value) -> Map<String, Value> {
    let mut header = Map::new();
    if let Some(object) = raw.as_object() {
        copy_present(object, "schemaVersion", &mut header);
        copy_present(object, "generated", &mut header);
    }
    header
}

fn copy_present(from: &Map<String, Value>, key: &str, into: &mut Map<String, Value>) {
    if let Some(value) = from.get(key) {
        into.insert(key.to_string(), value.clone());
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(_) | Value::Bool(_) => Some(display(Some(value), "")),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Text form of a raw field. Absent and `null` use `fallback`; whole numbers
/// print without a fractional part.
fn display(value: Option<&Value>, fallback: &str) -> String {
    match value {
        None | Some(Value::Null) => fallback.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => {
            if number.is_f64() {
                number.as_f64().map_or_else(|| number.to_string(), format_number)
            } else {
                number.to_string()
            }
        }
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dataset() -> Value {
        json!({
            "schemaVersion": "2",
            "generated": "2024-06-01T10:00:00Z",
            "apps": [
                { "id": "a1", "name": "Alpha", "tracks": {
                    "stable": { "version": "1.2.0", "code": 120, "date": "2024-01-01",
                                "url": "https://a/r", "download": "https://a/d" },
                    "beta": { "version": "1.3.0-b", "code": 130.0 }
                }},
                { "id": "b2", "tracks": { "stable": { "version": "0.9" } } },
                "garbage",
                { "id": "c3", "tracks": { "nightly": { "version": "9", "code": 9 } } }
            ]
        })
    }

    fn render(query: &str) -> EndpointResponse {
        let request = EndpointRequest::from_query(query).unwrap();
        render_endpoint(&dataset(), &request, CodeEndpointMode::NumericCode).unwrap()
    }

    #[test]
    fn from_query_defaults_and_interactive_mode() {
        assert_eq!(EndpointRequest::from_query(""), None);
        assert_eq!(EndpointRequest::from_query("?format=&q=x"), None);
        assert_eq!(EndpointRequest::from_query("?format=xml"), None);
        assert_eq!(
            EndpointRequest::from_query("?format=JSON&app=a1&track=Beta&latest=1"),
            Some(EndpointRequest {
                format: EndpointFormat::Json,
                app_id: Some("a1".to_string()),
                track_key: "beta".to_string(),
                latest_only: true,
            })
        );
        let request = EndpointRequest::from_query("format=txt&latest=true&app=").unwrap();
        assert_eq!(request, EndpointRequest::new(EndpointFormat::Txt));
    }

    #[test]
    fn code_for_all_apps() {
        let response = render("?format=code");
        assert_eq!(response.body, "a1=120\nb2=0\nc3=0");
        assert_eq!(response.title, "versions.txt");
        assert_eq!(response.content_type, CONTENT_TYPE_TEXT);

        assert_eq!(render("?format=code&track=beta").body, "a1=130\nb2=0\nc3=0");
    }

    #[test]
    fn code_for_one_app() {
        let response = render("?format=code&app=a1");
        assert_eq!(response.body, "120");
        assert_eq!(response.title, "a1.code");
        assert_eq!(render("?format=code&app=zz").body, "0");
        assert_eq!(render("?format=code&app=c3").body, "0");
    }

    #[test]
    fn code_version_string_mode() {
        let raw = dataset();
        let request = EndpointRequest::from_query("format=code").unwrap();
        let response = render_endpoint(&raw, &request, CodeEndpointMode::VersionString).unwrap();
        assert_eq!(response.body, "a1=1.2.0\nb2=0.9\nc3=");

        let request = EndpointRequest::from_query("format=code&app=a1&track=beta").unwrap();
        let response = render_endpoint(&raw, &request, CodeEndpointMode::VersionString).unwrap();
        assert_eq!(response.body, "1.3.0-b");
    }

    #[test]
    fn ini_blocks_are_blank_line_separated() {
        let response = render("?format=ini&track=beta");
        assert_eq!(response.title, "versions.ini");
        assert_eq!(
            response.body,
            "[a1]\nname=Alpha\ntrack=beta\nversion=1.3.0-b\ncode=130\ndate=\nurl=\ndownload=\n\
             \n\
             [b2]\nname=b2\ntrack=stable\nversion=0.9\ncode=0\ndate=\nurl=\ndownload=\n\
             \n\
             [c3]\nname=c3\ntrack=stable\nversion=\ncode=0\ndate=\nurl=\ndownload=\n"
        );
    }

    #[test]
    fn txt_single_app_and_not_found() {
        let response = render("?format=txt&app=a1");
        assert_eq!(response.title, "a1.txt");
        assert_eq!(
            response.body,
            "app=a1\nname=Alpha\ntrack=stable\nversion=1.2.0\ncode=120\ndate=2024-01-01\nurl=https://a/r\ndownload=https://a/d\n"
        );

        let response = render("?format=ini&app=zz&latest=1");
        assert_eq!(response.body, "error=app_not_found\napp=zz\n");
        assert_eq!(response.title, "zz.ini");
    }

    #[test]
    fn txt_latest_lines() {
        let response = render("?format=txt&latest=1");
        assert_eq!(response.body, "a1 120 1.2.0\nb2 0 0.9\nc3 0 ");
        assert_eq!(response.title, "latest.txt");
    }

    #[test]
    fn json_latest_includes_only_resolved_apps() {
        let response = render("?format=json&latest=1");
        assert_eq!(response.title, "versions.json");
        assert_eq!(response.content_type, CONTENT_TYPE_JSON);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(
            body,
            json!({
                "schemaVersion": "2",
                "generated": "2024-06-01T10:00:00Z",
                "latest": {
                    "a1": { "version": "1.2.0", "code": 120 },
                    "b2": { "version": "0.9" }
                }
            })
        );
    }

    #[test]
    fn json_app_reports_resolved_track() {
        let body: Value = serde_json::from_str(&render("?format=json&app=a1&track=rc").body).unwrap();
        assert_eq!(body["track"], json!("stable"));
        assert_eq!(body["latest"]["code"], json!(120));

        let response = render("?format=json&app=c3");
        assert_eq!(response.title, "c3.json");
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["track"], json!("stable"));
        assert_eq!(body["latest"], Value::Null);
        assert_eq!(body["app"], json!("c3"));
    }

    #[test]
    fn json_app_not_found_lists_available_ids() {
        let body: Value = serde_json::from_str(&render("?format=json&app=zz").body).unwrap();
        assert_eq!(
            body,
            json!({ "error": "app_not_found", "app": "zz", "available": ["a1", "b2", "c3"] })
        );
    }

    #[test]
    fn json_without_selectors_is_the_pretty_dataset() {
        let response = render("?format=json");
        assert_eq!(response.body, serde_json::to_string_pretty(&dataset()).unwrap());
        assert!(response.body.starts_with("{\n  \"schemaVersion\": \"2\""));
    }
}
