pub mod analyze_routes;
pub mod config;
pub mod request_id;
pub mod security_headers;

use std::sync::Arc;

use alpha_vantage_client::AlphaVantageClient;
use anyhow::Context;
use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use narrative_client::NarrativeClient;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use valuation_core::ValuationError;
use valuation_service::ValuationService;

pub use analyze_routes::analyze_routes;
pub use config::{HttpSettings, ServerConfig};

#[derive(Clone)]
pub struct AppState {
    pub valuation: Arc<ValuationService>,
}

impl AppState {
    pub fn new(valuation: Arc<ValuationService>) -> Self {
        Self { valuation }
    }

    /// Wire the real Alpha Vantage and completion clients from config.
    pub fn from_config(config: &ServerConfig) -> Self {
        let market_data = AlphaVantageClient::with_base_url(
            config.alpha_vantage_api_key.clone(),
            config.alpha_vantage_base_url.clone(),
            config.upstream_timeout,
        );
        let narrative = NarrativeClient::new(config.narrative.clone());

        Self::new(Arc::new(ValuationService::new(
            Arc::new(market_data),
            Arc::new(narrative),
        )))
    }
}

/// Error returned by handlers; renders as `{"success": false, "error": ...}`.
#[derive(Debug)]
pub struct AppError(pub ValuationError);

impl From<ValuationError> for AppError {
    fn from(err: ValuationError) -> Self {
        AppError(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ValuationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ValuationError::UpstreamDataMissing(_) => StatusCode::NOT_FOUND,
            ValuationError::ComputationUndefined(_) => StatusCode::NOT_FOUND,
            ValuationError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();

        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), %status, "{}", message);
        } else {
            tracing::warn!(kind = self.0.kind(), %status, "{}", message);
        }

        (
            status,
            Json(json!({
                "success": false,
                "error": message,
            })),
        )
            .into_response()
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "api-server",
    }))
}

fn cors_layer(settings: &HttpSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("x-request-id")])
}

pub fn build_router(state: AppState, settings: &HttpSettings) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(analyze_routes())
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            settings.enable_hsts,
            security_headers::security_headers_middleware,
        ))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(cors_layer(settings))
}

/// `RUST_LOG` filter, JSON lines when `RUST_LOG_FORMAT=json`.
pub fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "api_server=info,valuation_service=info,tower_http=info".into());

    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for SIGINT: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(&config);
    let app = build_router(state, &config.http);

    tracing::info!(
        alpha_vantage = %config.alpha_vantage_base_url,
        narrative = %config.narrative.api_url,
        timeout_secs = config.upstream_timeout.as_secs(),
        "Stock valuation API v{}",
        env!("CARGO_PKG_VERSION")
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}
