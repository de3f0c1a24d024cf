use crate::analyzer::AnalyzedRow;
use crate::analyzer::MISSING_DISPLAY;
use crate::analyzer::RowMeta;
use crate::analyzer::Severity;
use crate::analyzer::analyze_rows;
use crate::analyzer::parse_release_date;
use crate::config::PipelineConfig;
use crate::dataset::AppSummary;
use crate::dataset::TrackEntry;
use crate::dataset::normalize_dataset;
use crate::endpoint::EndpointRequest;
use crate::endpoint::EndpointResponse;
use crate::endpoint::render_endpoint;
use crate::error::Result;
use crate::filter_state::FilterState;
use crate::filter_state::url_query_string;
use crate::query::parse_query;
use crate::sort::sort_rows;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;
use tracing::warn;

const DEFAULT_SCHEMA_VERSION: &str = "2";

/// Header facts about the loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetInfo {
    pub schema_version: String,
    pub generated: Option<String>,
    /// `generated` as `DD Mon YYYY • HH:MM UTC`, or the raw text when it does
    /// not parse.
    pub generated_display: String,
    pub app_count: usize,
}

impl DatasetInfo {
    fn from_raw(raw: &Value) -> Self {
        let text = |key: &str| match raw.get(key) {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        };
        let generated = text("generated");
        let generated_display = match generated.as_deref() {
            None => MISSING_DISPLAY.to_string(),
            Some(raw_text) => parse_release_date(raw_text)
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(|date| date.format("%d %b %Y • %H:%M UTC").to_string())
                .unwrap_or_else(|| raw_text.to_string()),
        };
        Self {
            schema_version: text("schemaVersion")
                .filter(|version| !version.is_empty())
                .unwrap_or_else(|| DEFAULT_SCHEMA_VERSION.to_string()),
            generated,
            generated_display,
            app_count: raw
                .get("apps")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
        }
    }
}

/// One visible row, flattened for renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub app_id: String,
    pub app_name: String,
    pub track: String,
    pub latest: TrackEntry,
    pub meta: RowMeta,
}

impl From<&AnalyzedRow> for RowView {
    fn from(analyzed: &AnalyzedRow) -> Self {
        Self {
            app_id: analyzed.row.app.id.clone(),
            app_name: analyzed.row.app.name.clone(),
            track: analyzed.row.track_key.clone(),
            latest: analyzed.row.latest.clone(),
            meta: analyzed.meta.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewSummary {
    pub total: usize,
    pub visible: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub ok: usize,
    pub stale: usize,
    pub future: usize,
    pub missing: usize,
}

impl ViewSummary {
    fn tally(rows: &[AnalyzedRow], visible: usize) -> Self {
        let mut summary = Self {
            total: rows.len(),
            visible,
            ..Default::default()
        };
        for row in rows {
            match row.meta.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warn => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
                Severity::Ok => summary.ok += 1,
            }
            summary.stale += usize::from(row.meta.flags.stale);
            summary.future += usize::from(row.meta.flags.future);
            summary.missing += usize::from(row.meta.flags.any_missing());
        }
        summary
    }
}

/// Everything a renderer needs for one interactive frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogView {
    pub state: FilterState,
    /// Canonical URL query for `state`, without the leading `?`
    pub query: String,
    pub dataset: DatasetInfo,
    pub summary: ViewSummary,
    pub rows: Vec<RowView>,
    /// Picker entries: apps of the visible rows, or every app when nothing is
    /// visible
    pub apps: Vec<AppSummary>,
    pub warnings: Vec<String>,
}

/// The in-memory model for one dataset load.
///
/// Built once per (re)load and never patched; a reload constructs a new
/// catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    config: PipelineConfig,
    raw: Value,
    rows: Vec<AnalyzedRow>,
    apps: Vec<AppSummary>,
    warnings: Vec<String>,
    info: DatasetInfo,
}

impl Catalog {
    /// Normalize and analyze `raw`. `diagnostics` are non-fatal messages from
    /// acquisition and are listed before the normalizer's warnings.
    pub fn build(
        config: PipelineConfig,
        raw: Value,
        diagnostics: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let normalized = normalize_dataset(&raw);
        let mut warnings = diagnostics;
        warnings.extend(normalized.warnings);
        for warning in &warnings {
            warn!("{warning}");
        }

        let rows = analyze_rows(normalized.rows, now, &config);
        let info = DatasetInfo::from_raw(&raw);
        debug!(
            apps = normalized.apps.len(),
            rows = rows.len(),
            warnings = warnings.len(),
            schema_version = %info.schema_version,
            "catalog rebuilt"
        );
        Self {
            config,
            raw,
            rows,
            apps: normalized.apps,
            warnings,
            info,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn rows(&self) -> &[AnalyzedRow] {
        &self.rows
    }

    pub fn apps(&self) -> &[AppSummary] {
        &self.apps
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    /// Rows passing the track filter, enabled toggles and query, in sort order.
    pub fn visible_rows(&self, state: &FilterState) -> Vec<AnalyzedRow> {
        let ast = parse_query(&state.q);
        let toggles = state.toggles;
        let mut visible: Vec<AnalyzedRow> = self
            .rows
            .iter()
            .filter(|row| state.track.admits(&row.row.track_key))
            .filter(|row| !toggles.issues || row.meta.has_issues)
            .filter(|row| !toggles.stale || row.meta.flags.stale)
            .filter(|row| !toggles.missing || row.meta.flags.any_missing())
            .filter(|row| !toggles.future || row.meta.flags.future)
            .filter(|row| ast.matches(row))
            .cloned()
            .collect();
        sort_rows(&mut visible, state.sort);
        visible
    }

    pub fn view(&self, state: &FilterState) -> CatalogView {
        let visible = self.visible_rows(state);

        let mut seen = HashSet::new();
        let mut apps: Vec<AppSummary> = visible
            .iter()
            .filter(|row| seen.insert(row.row.app.id.as_str()))
            .map(|row| AppSummary {
                id: row.row.app.id.clone(),
                name: row.row.app.name.clone(),
            })
            .collect();
        if apps.is_empty() {
            apps = self.apps.clone();
        }

        CatalogView {
            state: state.clone(),
            query: url_query_string(state, ""),
            dataset: self.info.clone(),
            summary: ViewSummary::tally(&self.rows, visible.len()),
            rows: visible.iter().map(RowView::from).collect(),
            apps,
            warnings: self.warnings.clone(),
        }
    }

    /// Serve a machine endpoint from the raw dataset.
    pub fn respond(&self, request: &EndpointRequest) -> Result<EndpointResponse> {
        render_endpoint(&self.raw, request, self.config.code_endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_state::PartialFilterState;
    use crate::filter_state::TrackFilter;
    use crate::filter_state::normalize;
    use crate::sort::SortKey;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> Catalog {
        let raw = json!({
            "schemaVersion": 3,
            "generated": "2024-06-01T09:05:00Z",
            "apps": [
                { "id": "a1", "name": "Alpha", "tracks": {
                    "stable": { "version": "1.0", "code": 10, "date": "2024-05-25",
                                "url": "https://a", "download": "https://a/d" },
                    "beta": { "version": "1.1", "code": 5, "date": "2024-05-28",
                              "url": "https://a", "download": "https://a/d" }
                }},
                { "id": "b2", "name": "Bravo", "tracks": {
                    "stable": { "version": "0.1", "code": 1, "date": "2023-01-01" }
                }},
                { "tracks": {} }
            ]
        });
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap();
        Catalog::build(
            PipelineConfig::default(),
            raw,
            vec!["Using cached dataset: offline".to_string()],
            now,
        )
    }

    fn state(query: &str) -> FilterState {
        normalize(
            &[PartialFilterState::from_query(query)],
            &PipelineConfig::default(),
        )
    }

    fn ids(view: &CatalogView) -> Vec<String> {
        view.rows
            .iter()
            .map(|row| format!("{}/{}", row.app_id, row.track))
            .collect()
    }

    #[test]
    fn diagnostics_precede_normalizer_warnings() {
        assert_eq!(
            catalog().warnings(),
            [
                "Using cached dataset: offline".to_string(),
                "App entry 2 is missing an id.".to_string(),
            ]
        );
    }

    #[test]
    fn dataset_info_formats_generated() {
        let info = catalog().info().clone();
        assert_eq!(
            info,
            DatasetInfo {
                schema_version: "3".to_string(),
                generated: Some("2024-06-01T09:05:00Z".to_string()),
                generated_display: "01 Jun 2024 • 09:05 UTC".to_string(),
                app_count: 3,
            }
        );
    }

    #[test]
    fn default_state_shows_stable_rows_by_code() {
        let view = catalog().view(&FilterState::default());
        assert_eq!(ids(&view), vec!["a1/stable", "b2/stable"]);
        assert_eq!(view.query, "");
        assert_eq!(view.summary.total, 3);
        assert_eq!(view.summary.visible, 2);
    }

    #[test]
    fn toggles_narrow_the_visible_set() {
        let catalog = catalog();
        let view = catalog.view(&state("track=all&issues=1"));
        assert_eq!(ids(&view), vec!["a1/beta", "b2/stable"]);

        let view = catalog.view(&state("track=all&stale=1&missing=1"));
        assert_eq!(ids(&view), vec!["b2/stable"]);
    }

    #[test]
    fn picker_falls_back_to_all_apps() {
        let catalog = catalog();
        let view = catalog.view(&state("track=beta"));
        assert_eq!(
            view.apps,
            vec![AppSummary {
                id: "a1".to_string(),
                name: "Alpha".to_string()
            }]
        );

        let view = catalog.view(&state("q=nothing-matches"));
        assert!(view.rows.is_empty());
        assert_eq!(view.apps.len(), 2);
    }

    #[test]
    fn summary_counts_every_row() {
        let view = catalog().view(&state("track=beta"));
        assert_eq!(
            view.summary,
            ViewSummary {
                total: 3,
                visible: 1,
                errors: 0,
                warnings: 2,
                infos: 0,
                ok: 1,
                stale: 1,
                future: 0,
                missing: 1,
            }
        );
        assert_eq!(view.state.track, TrackFilter::Beta);
        assert_eq!(view.query, "track=beta");
    }

    #[test]
    fn sort_and_query_apply_after_filters() {
        let view = catalog().view(&state("track=all&sort=name_desc&q=code>1"));
        assert_eq!(view.state.sort, SortKey::NameDesc);
        assert_eq!(ids(&view), vec!["a1/stable", "a1/beta"]);
    }

    #[test]
    fn respond_reads_the_raw_dataset() {
        let request = EndpointRequest::from_query("format=code&app=a1&track=beta").unwrap();
        let response = catalog().respond(&request).unwrap();
        assert_eq!(response.body, "5");
    }
}
