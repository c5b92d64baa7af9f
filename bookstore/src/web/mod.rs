use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::email::Mailer;
use crate::gateway::PaymentGateway;
use crate::model::GenericError;
use crate::storage::{BookStorage, OrderStorage, PaymentStorage, UserStorage};

pub mod book;
pub mod error;
pub mod order;
pub mod payment;
pub mod user;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStorage>,
    pub books: Arc<dyn BookStorage>,
    pub orders: Arc<dyn OrderStorage>,
    pub payments: Arc<dyn PaymentStorage>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub uploads_dir: String,
    pub frontend_url: String,
}

static PROMETHEUS: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install the prometheus recorder")
});

pub fn build_router(state: AppState, cors_origin: &str) -> Result<Router, GenericError> {
    // Install the recorder up front so every request is counted.
    Lazy::force(&PROMETHEUS);

    let origin = cors_origin.parse::<header::HeaderValue>()?;
    let uploads_dir = state.uploads_dir.clone();

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/book", book::router())
        .nest("/user", user::router())
        .nest("/orders", order::router())
        .nest("/payments", payment::router())
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .fallback(route_not_found)
        .layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    Ok(app)
}

pub async fn root() -> impl IntoResponse {
    "Bookstore backend is running"
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler() -> impl IntoResponse {
    PROMETHEUS.render()
}

async fn route_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Route not found" })),
    )
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Label with the route template ("/book/{id}"), not the concrete path,
    // to keep the label cardinality bounded.
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| "unknown".to_string());

    let response = next.run(request).await;

    let latency = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path,
        "status" => status
    )
    .record(latency);

    response
}
