//! HTTP handlers
//!
//! HTML routes for the browser (`/`, `/filter`, `/show`), their JSON
//! equivalents under `/api/v1`, and probe/metrics endpoints.

use super::metrics::Metrics;
use super::views::Views;
use crate::catalog::{CrdCatalog, CrdSchemaView};
use crate::error::{Error, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query of `/filter`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    #[serde(default)]
    pub api_group: String,
}

/// Query of `/show`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowQuery {
    #[serde(default)]
    pub crd_name: String,
}

/// Query of `/api/v1/crds`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrdListQuery {
    #[serde(default)]
    pub group: String,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
}

// =============================================================================
// Router
// =============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: CrdCatalog,
    pub views: Arc<Views>,
    pub metrics: Arc<Metrics>,
}

/// Router builder
pub struct RestRouter {
    state: AppState,
}

impl RestRouter {
    pub fn new(catalog: CrdCatalog, views: Arc<Views>, metrics: Arc<Metrics>) -> Self {
        Self {
            state: AppState {
                catalog,
                views,
                metrics,
            },
        }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        Router::new()
            // Browser
            .route("/", get(index))
            .route("/filter", get(filter_crds))
            .route("/show", get(show_crd))
            // JSON API
            .route("/api/v1/groups", get(list_groups))
            .route("/api/v1/crds", get(list_crds))
            .route("/api/v1/crds/:name/schema", get(get_schema))
            // Probes
            .route("/healthz", get(health_check))
            .route("/readyz", get(readiness_check))
            .route("/metrics", get(metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state)
    }
}

// =============================================================================
// Response helpers
// =============================================================================

fn status_of(err: &Error) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn log_failure(state: &AppState, route: &str, err: &Error) {
    state.metrics.observe_error(err);
    if err.is_client_error() {
        warn!("{} rejected: {}", route, err);
    } else if err.is_transient() {
        warn!("{} failed, may succeed on retry: {}", route, err);
    } else {
        error!("{} failed: {}", route, err);
    }
}

/// Plain-text error for the browser routes
fn html_response(state: &AppState, route: &str, result: Result<String>) -> Response {
    let response = match result {
        Ok(body) => Html(body).into_response(),
        Err(err) => {
            log_failure(state, route, &err);
            let message = match &err {
                Error::Validation(msg) => msg.clone(),
                Error::NotFound { .. } | Error::SchemaUnavailable { .. } => err.to_string(),
                _ => "Internal Server Error".to_string(),
            };
            (status_of(&err), message).into_response()
        }
    };
    state.metrics.observe_request(route, response.status().as_u16());
    response
}

/// JSON body or [`ApiErrorResponse`]
fn json_response<T: Serialize>(state: &AppState, route: &str, result: Result<T>) -> Response {
    let response = match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => {
            log_failure(state, route, &err);
            (
                status_of(&err),
                Json(ApiErrorResponse {
                    error: err.code().into(),
                    message: err.to_string(),
                }),
            )
                .into_response()
        }
    };
    state.metrics.observe_request(route, response.status().as_u16());
    response
}

// =============================================================================
// Browser Handlers
// =============================================================================

/// Landing page listing API groups
async fn index(State(state): State<AppState>) -> Response {
    info!("Request to Index Route /");
    let result = render_index(&state).await;
    html_response(&state, "/", result)
}

async fn render_index(state: &AppState) -> Result<String> {
    let groups = state.catalog.list_api_groups().await?;
    state.views.index(&state.catalog.source_description(), &groups)
}

/// CRD selector for one API group
async fn filter_crds(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Response {
    info!("Request to Filter CRDs Route /filter (ApiGroup: {})", query.api_group);
    let result = render_crd_select_box(&state, &query.api_group).await;
    html_response(&state, "/filter", result)
}

async fn render_crd_select_box(state: &AppState, api_group: &str) -> Result<String> {
    let crds = state.catalog.list_crds(api_group).await?;
    state.views.crd_select_box(api_group, &crds)
}

/// Schema tree of one CRD
async fn show_crd(State(state): State<AppState>, Query(query): Query<ShowQuery>) -> Response {
    info!("Request to Show CRD Route /show (CRD: {})", query.crd_name);
    let result = render_crd_properties(&state, &query.crd_name).await;
    html_response(&state, "/show", result)
}

async fn render_crd_properties(state: &AppState, crd_name: &str) -> Result<String> {
    let view = describe_timed(state, crd_name).await?;
    state.views.crd_properties(&view)
}

/// Describe a CRD, observing the duration of successful calls only
async fn describe_timed(state: &AppState, crd_name: &str) -> Result<CrdSchemaView> {
    let timer = state.metrics.show_schema_seconds.start_timer();
    let result = state.catalog.describe(crd_name).await;
    if result.is_ok() {
        timer.observe_duration();
    } else {
        timer.stop_and_discard();
    }
    result
}

// =============================================================================
// JSON Handlers
// =============================================================================

async fn list_groups(State(state): State<AppState>) -> Response {
    let result = state.catalog.list_api_groups().await;
    json_response(&state, "/api/v1/groups", result)
}

async fn list_crds(State(state): State<AppState>, Query(query): Query<CrdListQuery>) -> Response {
    let result = state.catalog.list_crds(&query.group).await;
    json_response(&state, "/api/v1/crds", result)
}

async fn get_schema(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let result = describe_timed(&state, &name).await;
    json_response(&state, "/api/v1/crds/:name/schema", result)
}

// =============================================================================
// Probes
// =============================================================================

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.catalog.is_cancelled() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    } else {
        (StatusCode::OK, "ready")
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok((content_type, body)) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => {
            error!("Metrics encoding failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
