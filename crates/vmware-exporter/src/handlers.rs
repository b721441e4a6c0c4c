//! HTTP handlers and routing.

use axum::Router;
use axum::extract::State;
use axum::http::{Method, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tower_http::compression::CompressionLayer;

use vmware_exporter_core::registry::TEXT_CONTENT_TYPE;

use crate::access_log::AccessLogLayer;
use crate::state::AppState;

const HEALTH_PATH: &str = "/health";

/// Builds the application router with the exposition handler on `state.telemetry_path`.
pub(crate) fn router(state: AppState) -> Router {
    let telemetry_path = state.telemetry_path.clone();
    Router::new()
        .route("/", get(handle_index))
        .route(HEALTH_PATH, get(handle_health))
        .route(&telemetry_path, get(handle_metrics))
        .with_state(state)
        .layer(AccessLogLayer)
        .layer(CompressionLayer::new())
}

/// Checks that the exposition path can be mounted next to the fixed routes.
pub(crate) fn validate_telemetry_path(path: &str) -> Result<(), String> {
    if !path.starts_with('/') {
        return Err(format!("telemetry path {path:?} must start with '/'"));
    }
    if path == "/" || path == HEALTH_PATH {
        return Err(format!("telemetry path {path:?} collides with a built-in route"));
    }
    Ok(())
}

// ============================================================
// Exposition
// ============================================================

/// Triggers a refresh (GET only) and returns the current snapshot without
/// waiting for it. Always 200: failed collectors leave stale or absent series.
pub(crate) async fn handle_metrics(method: Method, State(state): State<AppState>) -> Response {
    if method == Method::GET {
        state.refresher.trigger();
    }
    let body = state.registry().render();
    ([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response()
}

// ============================================================
// Landing page / health
// ============================================================

pub(crate) async fn handle_index(State(state): State<AppState>) -> Html<String> {
    let path = &state.telemetry_path;
    Html(format!(
        "<html>\n\
         <head><title>VMware Exporter</title></head>\n\
         <body>\n\
         <h1>VMware Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n"
    ))
}

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}
