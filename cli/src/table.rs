//! Plain-text rendering of a catalog view.

use owo_colors::OwoColorize;
use repoversion_core::CatalogView;
use repoversion_core::Severity;
use repoversion_core::Tone;

const HEADERS: [&str; 7] = ["APP", "TRACK", "VERSION", "CODE", "DATE", "STATUS", "BADGES"];

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub color: bool,
}

impl Palette {
    fn severity(self, severity: Severity, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        match severity {
            Severity::Error => text.red().to_string(),
            Severity::Warn => text.yellow().to_string(),
            Severity::Info => text.cyan().to_string(),
            Severity::Ok => text.green().to_string(),
        }
    }

    fn tone(self, tone: Tone, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        match tone {
            Tone::Error => text.red().to_string(),
            Tone::Warn => text.yellow().to_string(),
            Tone::Info => text.dimmed().to_string(),
        }
    }

    fn header(self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }
}

pub fn render_table(view: &CatalogView, palette: Palette) -> String {
    let mut out = String::new();
    if view.rows.is_empty() {
        out.push_str("No rows match the current filters.\n");
    } else {
        let cells: Vec<[String; 6]> = view
            .rows
            .iter()
            .map(|row| {
                [
                    format!("{} ({})", row.app_name, row.app_id),
                    row.track.clone(),
                    row.meta.version_text.clone(),
                    row.meta.code_label.clone(),
                    row.meta.date_display.clone(),
                    row.meta.severity.as_str().to_string(),
                ]
            })
            .collect();
        let mut widths = [0usize; 6];
        for (index, width) in widths.iter_mut().enumerate() {
            *width = cells
                .iter()
                .map(|cell| cell[index].chars().count())
                .chain(std::iter::once(HEADERS[index].len()))
                .max()
                .unwrap_or_default();
        }

        let header = HEADERS
            .iter()
            .take(6)
            .zip(widths)
            .map(|(title, width)| format!("{title:<width$}"))
            .chain(std::iter::once(HEADERS[6].to_string()))
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(&palette.header(header.trim_end()));
        out.push('\n');

        for (row, cell) in view.rows.iter().zip(&cells) {
            let mut line = String::new();
            for (index, text) in cell.iter().enumerate() {
                let width = widths[index];
                let padded = format!("{text:<width$}");
                if index == 5 {
                    line.push_str(&palette.severity(row.meta.severity, &padded));
                } else {
                    line.push_str(&padded);
                }
                line.push_str("  ");
            }
            let badges = row
                .meta
                .badges
                .iter()
                .map(|badge| palette.tone(badge.tone, &badge.label))
                .collect::<Vec<_>>()
                .join(", ");
            line.push_str(&badges);
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }

    let summary = &view.summary;
    out.push_str(&format!(
        "\n{} of {} rows | {} error | {} warn | {} info | {} ok | {} stale | {} future | {} missing\n",
        summary.visible,
        summary.total,
        summary.errors,
        summary.warnings,
        summary.infos,
        summary.ok,
        summary.stale,
        summary.future,
        summary.missing,
    ));
    out.push_str(&format!(
        "schema {} | {} apps | updated {}\n",
        view.dataset.schema_version, view.dataset.app_count, view.dataset.generated_display
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use repoversion_core::Catalog;
    use repoversion_core::FilterState;
    use repoversion_core::PipelineConfig;
    use serde_json::json;

    #[test]
    fn renders_rows_and_summary_without_color() {
        let raw = json!({ "generated": "2024-06-01T00:00:00Z", "apps": [
            { "id": "a1", "name": "Alpha", "tracks": { "stable": {
                "version": "1.2.0", "code": 120, "date": "2024-05-30",
                "url": "https://a", "download": "https://a/d"
            }}},
            { "id": "b2", "tracks": { "stable": { "code": 7 } } }
        ]});
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().unwrap();
        let catalog = Catalog::build(PipelineConfig::default(), raw, Vec::new(), now);
        let text = render_table(&catalog.view(&FilterState::default()), Palette { color: false });
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("APP"));
        assert!(lines[1].starts_with("Alpha (a1)"));
        assert!(lines[1].contains("ok"));
        assert!(lines[2].contains("Missing version, Missing date, Missing links"));
        assert!(text.contains("2 of 2 rows | 1 error | 0 warn | 0 info | 1 ok"));
        assert!(text.contains("updated 01 Jun 2024 • 00:00 UTC"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn empty_view_says_so() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().unwrap();
        let catalog = Catalog::build(PipelineConfig::default(), json!({ "apps": [] }), Vec::new(), now);
        let text = render_table(&catalog.view(&FilterState::default()), Palette { color: false });
        assert!(text.starts_with("No rows match the current filters."));
    }
}
