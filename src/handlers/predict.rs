use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use super::{ApiErr, Ctx, Result};
use crate::{
    models::{PredictReq, PredictResp},
    predictor::{Error, Prediction},
};

/// Predict the next words for the text in the request body.
pub async fn predict(
    State(ctx): State<Arc<Ctx>>,
    body: std::result::Result<Json<PredictReq>, JsonRejection>,
) -> Result<Json<PredictResp>> {
    let req = match body {
        Ok(Json(req)) => req,
        Err(e) => {
            // An unloaded model is reported ahead of payload problems.
            if !ctx.predictor.model().is_ready() {
                return Err(Error::ModelUnavailable.into());
            }
            return Err(ApiErr::new(e.body_text(), StatusCode::BAD_REQUEST));
        }
    };

    let text = req.text.clone().unwrap_or_default();
    if let Some(cache) = &ctx.cache {
        if ctx.predictor.model().is_ready() {
            if let Some(p) = cache.get(&text) {
                return Ok(Json(PredictResp::ok(p)));
            }
        }
    }

    // Inference is CPU bound; keep it off the async workers.
    let predictor = ctx.predictor.clone();
    let res = tokio::task::spawn_blocking(move || predictor.handle(&req))
        .await
        .map_err(|e| {
            log::error!("error in prediction task: {}", e);
            ApiErr::new(
                "prediction failed unexpectedly",
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        })?;

    match res {
        Ok(Prediction::Candidates(c)) => {
            if let Some(cache) = &ctx.cache {
                cache.put(&text, &c);
            }
            Ok(Json(PredictResp::ok(c)))
        }
        Ok(Prediction::Gated(reason)) => Ok(Json(PredictResp::message(reason.message()))),
        Err(e) => {
            if let Error::Model(ref err) = e {
                log::error!("error in prediction: {}", err);
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header, Request},
        response::IntoResponse,
    };

    use crate::{
        cache::{Cache, CacheConfig},
        filter::Policy,
        handlers::Consts,
        lm::{testing::FakeModel, ModelHandle},
        predictor::Predictor,
    };

    fn fake() -> FakeModel {
        FakeModel::new(&[
            ("Ġchào", 0.4),
            ("<|endoftext|>", 0.3),
            ("Ġbạn", 0.2),
            ("Ġasdf", 0.1),
        ])
    }

    fn ctx_with(model: ModelHandle, cache: Option<Arc<Cache>>) -> Arc<Ctx> {
        Arc::new(Ctx {
            predictor: Arc::new(Predictor::new(model, Policy::default(), 0, 0)),
            cache,
            consts: Consts::default(),
            version: "test".to_string(),
        })
    }

    fn ctx() -> Arc<Ctx> {
        ctx_with(ModelHandle::ready(Arc::new(fake())), None)
    }

    async fn extract(body: &str) -> std::result::Result<Json<PredictReq>, JsonRejection> {
        let req = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        Json::<PredictReq>::from_request(req, &()).await
    }

    /// Run the handler and return the status and decoded body.
    async fn call(ctx: Arc<Ctx>, body: &str) -> (StatusCode, PredictResp) {
        let resp = predict(State(ctx), extract(body).await).await.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn success() {
        let (status, body) = call(ctx(), r#"{"text": "Chiếc lá cuối cùng"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let words: Vec<&str> = body.predictions.iter().map(|c| c.word.as_str()).collect();
        assert_eq!(words, vec!["chào", "bạn"]);
        assert_eq!(body.predictions[0].probability, 0.4);
        assert!(body.message.is_none());
        assert!(body.error.is_none());
    }

    #[tokio::test]
    async fn gated() {
        let (status, body) = call(ctx(), r#"{"text": "  "}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.predictions.is_empty());
        assert_eq!(body.message.as_deref(), Some("Empty text"));

        let (_, body) = call(ctx(), r#"{"text": "xin qwerty"}"#).await;
        assert_eq!(body.message.as_deref(), Some("Last word is not a valid word"));
    }

    #[tokio::test]
    async fn missing_text() {
        let (status, body) = call(ctx(), r#"{"txt": "chào"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.predictions.is_empty());
        assert_eq!(body.error.as_deref(), Some("No text provided"));
    }

    #[tokio::test]
    async fn malformed_body() {
        let (status, body) = call(ctx(), "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.is_some());
    }

    #[tokio::test]
    async fn model_not_loaded() {
        let ctx = ctx_with(ModelHandle::Unavailable("missing".to_string()), None);
        let (status, body) = call(ctx.clone(), r#"{"text": "xin chào"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.as_deref(), Some("Model not loaded"));

        let (status, _) = call(ctx, "not json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn inference_error() {
        let mut m = fake();
        m.fail_infer = true;
        let ctx = ctx_with(ModelHandle::ready(Arc::new(m)), None);
        let (status, body) = call(ctx, r#"{"text": "xin chào"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.predictions.is_empty());
        assert!(body.error.unwrap().contains("inference failed"));
    }

    #[tokio::test]
    async fn cached() {
        let cache = Arc::new(Cache::new(&CacheConfig::default()).unwrap());
        let ctx = ctx_with(ModelHandle::ready(Arc::new(fake())), Some(cache.clone()));

        let (_, first) = call(ctx.clone(), r#"{"text": "xin chào"}"#).await;
        assert_eq!(cache.get("xin chào"), Some(first.predictions.clone()));

        let (_, second) = call(ctx, r#"{"text": "xin chào "}"#).await;
        assert_eq!(first, second);

        // Gated results aren't cached.
        let ctx = ctx_with(ModelHandle::ready(Arc::new(fake())), Some(cache.clone()));
        call(ctx, r#"{"text": "qwerty"}"#).await;
        assert!(cache.get("qwerty").is_none());
    }
}
