use crate::session::Runtime;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use repoversion_core::EndpointRequest;
use repoversion_core::PartialFilterState;
use repoversion_core::filter_state::normalize;

#[derive(Debug, Parser)]
pub struct RenderArgs {
    /// Request query string, e.g. `?format=json&latest=1`. Without a machine
    /// `format` the interactive view is printed as JSON.
    #[arg(value_name = "QUERY", default_value = "")]
    pub query: String,

    /// Also print the response title on stderr
    #[arg(long)]
    pub title: bool,
}

pub async fn run_render(runtime: &Runtime, args: RenderArgs) -> Result<()> {
    let catalog = runtime.load_catalog().await?;
    let (body, title) = match EndpointRequest::from_query(&args.query) {
        Some(request) => {
            let response = catalog
                .respond(&request)
                .context("render endpoint response")?;
            (response.body, response.title)
        }
        None => {
            let layers = [
                runtime.config.controls.clone(),
                PartialFilterState::from_query(&args.query),
            ];
            let state = normalize(&layers, catalog.config());
            let view = catalog.view(&state);
            let body = serde_json::to_string_pretty(&view).context("serialize view")?;
            (body, format!("?{}", view.query))
        }
    };
    if args.title {
        eprintln!("{title}");
    }
    if body.ends_with('\n') {
        print!("{body}");
    } else {
        println!("{body}");
    }
    Ok(())
}
