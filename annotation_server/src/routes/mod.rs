mod health;
mod metrics;
mod upload;
mod ws;

pub use upload::{UploadError, UploadResponse};

use crate::{
    server::SharedState,
    telemetry::{ROUTE_STREAM, ROUTE_UPLOAD},
};
use axum::{
    routing::{get, post},
    Router,
};
use health::healthcheck;
use metrics::metrics_handler;
use upload::upload;
use ws::ws_handler;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/metrics", get(metrics_handler))
        .route(ROUTE_UPLOAD, post(upload))
        .route(ROUTE_STREAM, get(ws_handler))
}
