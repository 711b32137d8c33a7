pub mod health;
pub mod predict;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{cache::Cache, models::PredictResp, predictor::Predictor};

/// Application context passed to all handlers.
pub struct Ctx {
    pub predictor: Arc<Predictor>,
    pub cache: Option<Arc<Cache>>,

    pub consts: Consts,
    pub version: String,
}

/// Application constants.
#[derive(Clone, Debug, Default)]
pub struct Consts {
    /// Origins allowed to call the API from a browser. Empty or "*" = any.
    pub cors_origins: Vec<String>,
}

/// API error type. Always serialized as an empty prediction list with an
/// error description.
#[derive(Debug)]
pub struct ApiErr {
    pub message: String,
    pub status: StatusCode,
}

impl ApiErr {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

impl From<crate::predictor::Error> for ApiErr {
    fn from(err: crate::predictor::Error) -> Self {
        use crate::predictor::Error;

        let status = match err {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::ModelUnavailable | Error::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(err.to_string(), status)
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        (self.status, Json(PredictResp::error(self.message))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiErr>;
