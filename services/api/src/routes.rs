use crate::infra::{AppState, ReloadContext};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use tracing::info;
use trial_match::error::AppError;
use trial_match::matching::match_router;

pub(crate) fn with_match_routes(context: &ReloadContext) -> axum::Router {
    match_router(context.service.clone())
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/admin/reload",
            axum::routing::post(reload_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Wholesale dataset refresh: read both CSVs, build a new snapshot, then
/// swap it in. In-flight requests keep the snapshot they started with.
pub(crate) async fn reload_endpoint(
    Extension(context): Extension<ReloadContext>,
) -> Result<Json<serde_json::Value>, AppError> {
    let dataset = crate::infra::load_dataset(&context.datasets).await?;
    let patients = dataset.patients().len();
    context.service.install_dataset(dataset);
    info!(patients, "dataset snapshot replaced");

    Ok(Json(json!({ "status": "reloaded", "patients": patients })))
}
