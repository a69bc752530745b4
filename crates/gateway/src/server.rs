//! Axum-based HTTP server.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        multipart::MultipartRejection, DefaultBodyLimit, MatchedPath, Multipart, Request, State,
    },
    http::{header::USER_AGENT, HeaderMap, HeaderValue, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultOnFailure, TraceLayer};

use photo_advisor_core::{config::AppConfig, Error, Result};
use photo_advisor_governance::track_request;

use crate::error::ApiError;
use crate::form::AnalyzeForm;
use crate::pipeline::AnalysisPipeline;

/// Room for the text fields and multipart framing on top of two files.
const FORM_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Allowed CORS origins. `*` allows any.
    pub allowed_origins: Vec<String>,
    /// Enable request tracing.
    pub enable_tracing: bool,
}

impl GatewayConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            allowed_origins: config.server.allowed_origins.clone(),
            enable_tracing: config.server.enable_tracing,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Shared application state.
pub struct AppState {
    pub pipeline: AnalysisPipeline,
}

/// Gateway server.
pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<AppState>,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, pipeline: AnalysisPipeline) -> Self {
        Self {
            config,
            state: Arc::new(AppState { pipeline }),
            metrics_handle: None,
        }
    }

    /// Expose `/metrics` with this handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Largest request body `/analyze` accepts.
    pub fn body_limit(&self) -> usize {
        let limit = self
            .state
            .pipeline
            .settings()
            .max_file_size
            .saturating_mul(2)
            .saturating_add(FORM_OVERHEAD_BYTES);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }

    /// Build the Axum router.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route(
                "/analyze",
                post(analyze_handler).layer(DefaultBodyLimit::max(self.body_limit())),
            )
            .with_state(self.state.clone());

        if let Some(handle) = &self.metrics_handle {
            let handle = handle.clone();
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        router = router
            .route_layer(middleware::from_fn(track_metrics))
            .layer(cors_layer(&self.config.allowed_origins));

        if self.config.enable_tracing {
            // The pipeline already logs server failures at error level.
            router = router.layer(
                TraceLayer::new_for_http()
                    .on_failure(DefaultOnFailure::new().level(tracing::Level::WARN)),
            );
        }

        router
    }

    /// Run the server until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "Photo Advisor server listening");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;
    track_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

// =============================================================================
// Response Types
// =============================================================================

/// Successful analysis.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub response: String,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Handlers
// =============================================================================

async fn root_handler() -> &'static str {
    "Photo Advisor backend is running"
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<AnalyzeResponse>, ApiError> {
    let multipart = multipart
        .map_err(|e| Error::invalid_request(format!("Expected a multipart form: {}", e.body_text())))?;

    let form = AnalyzeForm::from_multipart(multipart, state.pipeline.settings().max_file_size).await?;
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let reply = state.pipeline.run(form, user_agent).await?;
    Ok(Json(AnalyzeResponse {
        success: true,
        response: reply.response,
    }))
}
