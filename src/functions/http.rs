use axum::Router;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use tower_http::cors::CorsLayer;

/// Any origin, method and header. Bare `OPTIONS` requests that are not CORS
/// preflights still get a `200`.
pub fn with_cors(router: Router) -> Router {
    router
        .layer(middleware::from_fn(short_circuit_options))
        .layer(CorsLayer::permissive())
}

async fn short_circuit_options(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(req).await
}
