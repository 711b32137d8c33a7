use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

use crate::handlers::{health, predict, Ctx};

const CORS_METHODS: &str = "GET, POST, OPTIONS";
const CORS_HEADERS: &str = "Content-Type";

/// Initialize HTTP routes.
pub fn init_handlers(ctx: Arc<Ctx>) -> Router {
    Router::new()
        .route("/predict", post(predict::predict))
        .route("/health", get(health::health))
        .layer(middleware::from_fn_with_state(ctx.clone(), cors_middleware))
        .with_state(ctx)
}

/// CORS middleware. Preflight requests are answered directly; every other
/// response gets the allow headers when the origin is permitted.
async fn cors_middleware(
    State(ctx): State<Arc<Ctx>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let allow = allowed_origin(&ctx.consts.cors_origins, origin.as_deref());

    let mut resp = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    if let Some(allow) = allow {
        let h = resp.headers_mut();
        h.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow);
        h.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_METHODS),
        );
        h.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_HEADERS),
        );
        if origin.is_some() {
            h.insert(header::VARY, HeaderValue::from_static("Origin"));
        }
    }

    resp
}

/// Value of the Access-Control-Allow-Origin header for a request origin.
/// An empty list or "*" allows any origin.
fn allowed_origin(origins: &[String], origin: Option<&str>) -> Option<HeaderValue> {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Some(HeaderValue::from_static("*"));
    }

    let origin = origin?;
    if origins.iter().any(|o| o.trim_end_matches('/') == origin) {
        return HeaderValue::from_str(origin).ok();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::util::ServiceExt;

    use crate::{
        filter::Policy,
        handlers::Consts,
        lm::{testing::FakeModel, ModelHandle},
        predictor::Predictor,
    };

    fn router(model: ModelHandle, cors_origins: &[&str]) -> Router {
        let ctx = Arc::new(Ctx {
            predictor: Arc::new(Predictor::new(model, Policy::default(), 0, 0)),
            cache: None,
            consts: Consts {
                cors_origins: list(cors_origins),
            },
            version: "test".to_string(),
        });
        init_handlers(ctx)
    }

    fn request(method: Method, uri: &str, origin: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap()
    }

    fn list(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn any_origin() {
        assert_eq!(allowed_origin(&[], None).unwrap(), "*");
        assert_eq!(
            allowed_origin(&list(&["*"]), Some("http://a.vn")).unwrap(),
            "*"
        );
    }

    #[test]
    fn listed_origins() {
        let o = list(&["http://localhost:3000/", "https://go.vn"]);
        assert_eq!(
            allowed_origin(&o, Some("http://localhost:3000")).unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            allowed_origin(&o, Some("https://go.vn")).unwrap(),
            "https://go.vn"
        );
        assert!(allowed_origin(&o, Some("https://evil.example")).is_none());
        assert!(allowed_origin(&o, None).is_none());
    }

    #[tokio::test]
    async fn preflight() {
        let app = router(ModelHandle::Unavailable("missing".to_string()), &[]);
        let resp = app
            .oneshot(request(Method::OPTIONS, "/predict", "http://localhost:3000"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let h = resp.headers();
        assert_eq!(h.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(
            h.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            CORS_METHODS
        );
        assert_eq!(
            h.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            CORS_HEADERS
        );
    }

    #[tokio::test]
    async fn cors_on_responses() {
        // Error responses carry the headers too.
        let app = router(ModelHandle::Unavailable("missing".to_string()), &[]);
        let resp = app
            .oneshot(request(Method::GET, "/health", "http://localhost:3000"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );

        let model = ModelHandle::ready(Arc::new(FakeModel::new(&[("chào", 1.0)])));
        let app = router(model, &["https://go.vn"]);
        let resp = app
            .clone()
            .oneshot(request(Method::GET, "/health", "https://go.vn"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://go.vn"
        );

        // Unlisted origins get no allow headers.
        let resp = app
            .oneshot(request(Method::GET, "/health", "https://evil.example"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
