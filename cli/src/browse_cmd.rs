//! Line-oriented interactive session.
//!
//! Each command changes one field of the filter state, rebuilds the view from
//! scratch and stages a debounced write of the new state.

use crate::list_cmd::print_diagnostics;
use crate::session::Runtime;
use crate::table::Palette;
use crate::table::render_table;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use repoversion_core::Catalog;
use repoversion_core::DebouncedStateWriter;
use repoversion_core::FilterState;
use repoversion_core::PartialFilterState;
use repoversion_core::SortKey;
use repoversion_core::TrackFilter;
use repoversion_core::filter_state::normalize;
use std::time::Duration;
use std::time::Instant;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tracing::debug;

const HELP: &str = "\
commands:
  q <text>        set the search query (empty clears it)
  track <name>    all | stable | beta
  sort <key>      code_desc | code_asc | name_asc | name_desc | date_desc | date_asc | issues_first
  toggle <name>   issues | stale | missing | future
  reset           back to the configured defaults
  url             print the state as a URL query
  warnings        print dataset diagnostics
  help            this text
  quit            save pending state and exit";

#[derive(Debug, Parser)]
pub struct BrowseArgs {
    /// Initial state as a URL query string; overrides saved state
    #[arg(long, value_name = "QUERY")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    Query(String),
    Track(String),
    Sort(String),
    Toggle(String),
    Reset,
    Url,
    Warnings,
    Help,
    Quit,
    Unknown(String),
}

impl BrowseCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));
        Some(match word.to_ascii_lowercase().as_str() {
            "q" | "query" | "search" => Self::Query(rest.to_string()),
            "track" => Self::Track(rest.to_string()),
            "sort" => Self::Sort(rest.to_string()),
            "toggle" => Self::Toggle(rest.to_ascii_lowercase()),
            "reset" => Self::Reset,
            "url" => Self::Url,
            "warnings" => Self::Warnings,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(word.to_string()),
        })
    }
}

enum Outcome {
    Changed(FilterState),
    Print(String),
    Quit,
}

/// Apply one command to `state`. Invalid values leave the state unchanged and
/// explain why.
fn apply(
    command: BrowseCommand,
    state: &FilterState,
    baseline: &[PartialFilterState],
    catalog: &Catalog,
) -> Outcome {
    let current = PartialFilterState::from(state);
    let change = match command {
        BrowseCommand::Query(q) => PartialFilterState {
            q: Some(q),
            ..Default::default()
        },
        BrowseCommand::Track(track) => {
            if TrackFilter::parse(&track).is_none() {
                return Outcome::Print(format!("unknown track `{track}` (all, stable, beta)"));
            }
            PartialFilterState {
                track: Some(track),
                ..Default::default()
            }
        }
        BrowseCommand::Sort(sort) => {
            if SortKey::parse(&sort).is_none() {
                let known: Vec<&str> = SortKey::ALL.iter().map(|key| key.as_str()).collect();
                return Outcome::Print(format!("unknown sort `{sort}` ({})", known.join(", ")));
            }
            PartialFilterState {
                sort: Some(sort),
                ..Default::default()
            }
        }
        BrowseCommand::Toggle(name) => {
            let toggles = state.toggles;
            let mut change = PartialFilterState::default();
            match name.as_str() {
                "issues" => change.issues = Some(!toggles.issues),
                "stale" => change.stale = Some(!toggles.stale),
                "missing" => change.missing = Some(!toggles.missing),
                "future" => change.future = Some(!toggles.future),
                other => {
                    return Outcome::Print(format!(
                        "unknown toggle `{other}` (issues, stale, missing, future)"
                    ));
                }
            }
            change
        }
        BrowseCommand::Reset => {
            return Outcome::Changed(normalize(baseline, catalog.config()));
        }
        BrowseCommand::Url => {
            let query = catalog.view(state).query;
            return Outcome::Print(format!("?{query}"));
        }
        BrowseCommand::Warnings => {
            let warnings = catalog.warnings();
            return Outcome::Print(if warnings.is_empty() {
                "No dataset diagnostics.".to_string()
            } else {
                warnings.join("\n")
            });
        }
        BrowseCommand::Help => return Outcome::Print(HELP.to_string()),
        BrowseCommand::Quit => return Outcome::Quit,
        BrowseCommand::Unknown(word) => {
            return Outcome::Print(format!("unknown command `{word}`, try `help`"));
        }
    };
    Outcome::Changed(normalize(&[current, change], catalog.config()))
}

pub async fn run_browse(runtime: &Runtime, args: BrowseArgs) -> Result<()> {
    let catalog = runtime.load_catalog().await?;
    let palette = Palette {
        color: runtime.color,
    };
    let mut writer = DebouncedStateWriter::from_config(runtime.state_store(), catalog.config());

    let baseline = vec![runtime.config.controls.clone()];
    let mut layers = baseline.clone();
    if let Some(persisted) = writer.current().context("load saved filter state")? {
        layers.push(persisted);
    }
    if let Some(query) = &args.state {
        layers.push(PartialFilterState::from_query(query));
    }
    let mut state = normalize(&layers, catalog.config());

    print_diagnostics(catalog.warnings(), runtime.color);
    print!("{}", render_table(&catalog.view(&state), palette));
    println!("type `help` for commands");

    let quiet = Duration::from_millis(catalog.config().persist_debounce_ms);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else {
                    break;
                };
                let Some(command) = BrowseCommand::parse(&line) else {
                    continue;
                };
                match apply(command, &state, &baseline, &catalog) {
                    Outcome::Changed(next) => {
                        state = next;
                        debug!(?state, "state changed");
                        print!("{}", render_table(&catalog.view(&state), palette));
                        writer.stage(state.clone(), Instant::now());
                    }
                    Outcome::Print(text) => println!("{text}"),
                    Outcome::Quit => break,
                }
            }
            _ = tokio::time::sleep(quiet), if writer.is_pending() => {
                writer.flush_due(Instant::now()).context("save filter state")?;
            }
        }
    }
    writer.flush().context("save filter state")?;
    Ok(())
}
