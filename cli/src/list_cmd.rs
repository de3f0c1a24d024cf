use crate::session::Runtime;
use crate::table::Palette;
use crate::table::render_table;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use owo_colors::OwoColorize;
use repoversion_core::FilterState;
use repoversion_core::PartialFilterState;
use repoversion_core::StateStore;
use repoversion_core::filter_state::normalize;
use tracing::debug;

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Search query, e.g. `status:issues code>100 alpha`
    #[arg(long, value_name = "QUERY")]
    pub q: Option<String>,

    /// Track filter: all, stable or beta
    #[arg(long, value_name = "TRACK")]
    pub track: Option<String>,

    /// Sort key: code_desc, code_asc, name_asc, name_desc, date_desc, date_asc, issues_first
    #[arg(long, value_name = "SORT")]
    pub sort: Option<String>,

    /// Only rows with error or warn severity
    #[arg(long)]
    pub issues: bool,

    /// Only stale releases
    #[arg(long)]
    pub stale: bool,

    /// Only rows missing a version, code, date or links
    #[arg(long)]
    pub missing: bool,

    /// Only releases dated in the future
    #[arg(long)]
    pub future: bool,

    /// State as a URL query string, e.g. `?track=all&issues=1`
    #[arg(long, value_name = "QUERY")]
    pub state: Option<String>,

    /// Ignore previously saved state
    #[arg(long)]
    pub fresh: bool,

    /// Emit the view as JSON
    #[arg(long)]
    pub json: bool,

    /// Persist the resulting state for later sessions
    #[arg(long)]
    pub save: bool,
}

impl ListArgs {
    fn flag_layer(&self) -> PartialFilterState {
        PartialFilterState {
            q: self.q.clone(),
            track: self.track.clone(),
            sort: self.sort.clone(),
            issues: self.issues.then_some(true),
            stale: self.stale.then_some(true),
            missing: self.missing.then_some(true),
            future: self.future.then_some(true),
        }
    }
}

#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Fail when the dataset has diagnostics or error-severity rows
    #[arg(long)]
    pub strict: bool,
}

pub async fn run_list(runtime: &Runtime, args: ListArgs) -> Result<()> {
    let catalog = runtime.load_catalog().await?;
    let mut store = runtime.state_store();

    let mut layers = vec![runtime.config.controls.clone()];
    if !args.fresh
        && let Some(persisted) = store.load().context("load saved filter state")?
    {
        layers.push(persisted);
    }
    if let Some(query) = &args.state {
        layers.push(PartialFilterState::from_query(query));
    }
    layers.push(args.flag_layer());
    let state = normalize(&layers, catalog.config());
    debug!(?state, "list state");

    let view = catalog.view(&state);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view).context("serialize view")?);
    } else {
        print_diagnostics(catalog.warnings(), runtime.color);
        print!("{}", render_table(&view, Palette { color: runtime.color }));
        if !view.query.is_empty() {
            println!("state: ?{}", view.query);
        }
    }

    if args.save {
        store.save(&state).context("save filter state")?;
        eprintln!("Saved filter state to {}", store.path().display());
    }
    Ok(())
}

pub async fn run_check(runtime: &Runtime, args: CheckArgs) -> Result<()> {
    let catalog = runtime.load_catalog().await?;
    let summary = catalog.view(&FilterState::default()).summary;

    if catalog.warnings().is_empty() {
        println!("No dataset diagnostics.");
    } else {
        println!("{} dataset diagnostics:", catalog.warnings().len());
        for warning in catalog.warnings() {
            println!("  - {warning}");
        }
    }
    println!("rows: {}", summary.total);
    println!("error: {}", summary.errors);
    println!("warn: {}", summary.warnings);
    println!("info: {}", summary.infos);
    println!("ok: {}", summary.ok);
    println!("stale: {}", summary.stale);
    println!("future: {}", summary.future);
    println!("missing: {}", summary.missing);

    if args.strict && (!catalog.warnings().is_empty() || summary.errors > 0) {
        bail!(
            "dataset check failed: {} diagnostics, {} error rows",
            catalog.warnings().len(),
            summary.errors
        );
    }
    Ok(())
}

pub(crate) fn print_diagnostics(warnings: &[String], color: bool) {
    for warning in warnings {
        if color {
            eprintln!("{} {warning}", "warning:".yellow().bold());
        } else {
            eprintln!("warning: {warning}");
        }
    }
}
