use crate::session::Runtime;
use anyhow::Context;
use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::extract::RawQuery;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use clap::Parser;
use repoversion_core::Catalog;
use repoversion_core::EndpointRequest;
use repoversion_core::PartialFilterState;
use repoversion_core::filter_state::normalize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::info;
use tracing::warn;

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Listen address (overrides `bind` in config.toml)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Shared server state. Reloads swap the whole catalog, so a request always
/// sees one consistent build.
#[derive(Clone)]
pub struct ServerState {
    runtime: Arc<Runtime>,
    catalog: Arc<RwLock<Arc<Catalog>>>,
}

impl ServerState {
    pub fn new(runtime: Runtime, catalog: Catalog) -> Self {
        Self {
            runtime: Arc::new(runtime),
            catalog: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    async fn current(&self) -> Arc<Catalog> {
        Arc::clone(&*self.catalog.read().await)
    }
}

pub async fn run_serve(runtime: Runtime, args: ServeArgs) -> Result<()> {
    let catalog = runtime.load_catalog().await?;
    let bind = args
        .bind
        .clone()
        .unwrap_or_else(|| runtime.config.bind_addr().to_string());
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("repoversion serving {} on http://{addr}", runtime.source.describe());
    let app = router(ServerState::new(runtime, catalog));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/reload", post(reload_handler))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Machine endpoint when `format` is present, interactive view otherwise.
async fn root_handler(
    State(state): State<ServerState>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let query = query.unwrap_or_default();
    let catalog = state.current().await;
    if let Some(request) = EndpointRequest::from_query(&query) {
        let response = catalog.respond(&request).map_err(AppError::internal)?;
        let disposition = format!("inline; filename=\"{}\"", header_safe(&response.title));
        let headers = [
            (header::CONTENT_TYPE, HeaderValue::from_static(response.content_type)),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition).map_err(AppError::internal)?,
            ),
        ];
        return Ok((headers, response.body).into_response());
    }

    let layers = [
        state.runtime.config.controls.clone(),
        PartialFilterState::from_query(&query),
    ];
    let filter_state = normalize(&layers, catalog.config());
    Ok(Json(catalog.view(&filter_state)).into_response())
}

async fn health_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let catalog = state.current().await;
    Json(json!({
        "status": "ok",
        "apps": catalog.apps().len(),
        "rows": catalog.rows().len(),
        "warnings": catalog.warnings().len(),
    }))
}

async fn reload_handler(State(state): State<ServerState>) -> Result<Json<serde_json::Value>, AppError> {
    let fresh = state
        .runtime
        .load_catalog()
        .await
        .map_err(AppError::unavailable)?;
    let summary = json!({
        "status": "reloaded",
        "apps": fresh.apps().len(),
        "rows": fresh.rows().len(),
        "warnings": fresh.warnings(),
    });
    *state.catalog.write().await = Arc::new(fresh);
    info!("catalog reloaded");
    Ok(Json(summary))
}

fn header_safe(title: &str) -> String {
    title
        .chars()
        .filter(|ch| (ch.is_ascii_graphic() || *ch == ' ') && *ch != '"' && *ch != '\\')
        .collect()
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn internal(err: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }

    fn unavailable(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, "{}", self.message);
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_safe_strips_quotes_and_controls() {
        assert_eq!(header_safe("a\"b\n.code"), "ab.code");
        assert_eq!(header_safe("versions.json"), "versions.json");
        assert_eq!(header_safe("café.txt"), "caf.txt");
    }
}
