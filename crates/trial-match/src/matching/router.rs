use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::geo::PostalCodeSource;
use super::service::{MatchError, MatchRequest, MatchService};

/// Router builder exposing the match query and conditions endpoints.
pub fn match_router<S>(service: Arc<MatchService<S>>) -> Router
where
    S: PostalCodeSource + 'static,
{
    Router::new()
        .route("/api/v1/match/query", post(query_handler::<S>))
        .route("/api/v1/match/conditions", get(conditions_handler::<S>))
        .with_state(service)
}

pub(crate) async fn query_handler<S>(
    State(service): State<Arc<MatchService<S>>>,
    axum::Json(request): axum::Json<MatchRequest>,
) -> Response
where
    S: PostalCodeSource + 'static,
{
    match service.query(request).await {
        Ok(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        Err(error @ MatchError::DatasetUnavailable) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn conditions_handler<S>(
    State(service): State<Arc<MatchService<S>>>,
) -> Response
where
    S: PostalCodeSource + 'static,
{
    match service.conditions() {
        Ok(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        Err(error @ MatchError::DatasetUnavailable) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
    }
}
