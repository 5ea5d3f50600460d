//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub vision_model: String,
    pub chat_model: String,
}

/// `GET /api/health`: unauthenticated liveness check.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        vision_model: ctx.core.config.vision_model.clone(),
        chat_model: ctx.core.config.chat_model.clone(),
    })
}
