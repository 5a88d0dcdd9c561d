//! Roster keeps user records with unique login names and email addresses.
#![forbid(unsafe_code)]

pub mod config;
pub mod database;
pub mod error;
mod router;
pub mod telemetry;
pub mod user;

pub use error::ServerError;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::FromRef;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};

use crate::database::memory::MemoryUserRepository;
use crate::database::postgres::PgUserRepository;
use crate::user::{UserRepository, UserService};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub users: UserService,
    pub metrics: Option<PrometheusHandle>,
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> UserService {
        state.users.clone()
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(
                        size_bytes = chunk.len(),
                        latency = ?latency,
                        "sending body chunk"
                    )
                })
                .make_span_with(
                    DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO),
                )
                .on_request(DefaultOnRequest::new())
                .on_response(
                    DefaultOnResponse::new()
                        .include_headers(true)
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers(Any),
        );

    let mut routes = Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::handler))
        .nest("/api/users", router::users::router());

    if let Some(handle) = state.metrics.clone() {
        // `GET /metrics` renders the Prometheus scrape.
        routes = routes.route("/metrics", get(move || std::future::ready(handle.render())));
    }

    routes
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    config: Arc<config::Configuration>,
    metrics: Option<PrometheusHandle>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let repository: Arc<dyn UserRepository> = match config.postgres {
        Some(ref config) => {
            let db = database::Database::new(
                &config.address,
                &config.username.clone().unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config.password.clone().unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config.database.clone().unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?;

            // execute migrations scripts on start.
            db.migrate().await?;

            Arc::new(PgUserRepository::new(db.postgres))
        },
        None => {
            tracing::warn!(
                "missing `postgres` entry on `config.yaml` file, users are kept in memory"
            );

            Arc::new(MemoryUserRepository::new())
        },
    };

    Ok(AppState {
        config,
        users: UserService::new(repository),
        metrics,
    })
}
