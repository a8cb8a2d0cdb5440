pub mod borrowers;
pub mod kiosk;
pub mod loans;

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Unauthenticated liveness probe.
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}
