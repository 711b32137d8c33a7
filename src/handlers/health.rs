use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use super::Ctx;
use crate::models::{HealthResp, STATUS_ERROR, STATUS_HEALTHY};

/// Report whether the model is loaded and the service can predict.
pub async fn health(State(ctx): State<Arc<Ctx>>) -> (StatusCode, Json<HealthResp>) {
    match ctx.predictor.model().get() {
        Some(m) => (
            StatusCode::OK,
            Json(HealthResp {
                status: STATUS_HEALTHY.to_string(),
                message: "Service is running with model loaded".to_string(),
                model: Some(m.name().to_string()),
                version: Some(ctx.version.clone()),
            }),
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResp {
                status: STATUS_ERROR.to_string(),
                message: "Model not loaded".to_string(),
                model: None,
                version: Some(ctx.version.clone()),
            }),
        ),
    }
}
