//! The thin transport surface. All semantics live behind
//! [crate::api::dispatch]; this layer only frames it over HTTP for
//! the local agent.

use armada_client::entities::ResponseEnvelope;
use axum::{
  Json, Router,
  routing::{get, post},
};

pub fn router() -> Router {
  Router::new()
    .route("/request", post(handle_request))
    .route("/health", get(health))
}

async fn handle_request(
  Json(request): Json<serde_json::Value>,
) -> Json<ResponseEnvelope> {
  Json(crate::api::dispatch(request).await)
}

async fn health() -> &'static str {
  "OK"
}
