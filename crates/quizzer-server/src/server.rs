//! `QuizzerServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use quizzer_core::{QuizId, UserId};
use quizzer_execution::ExecutionRegistry;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live executions.
    pub registry: Arc<ExecutionRegistry>,
    /// Transport configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// Body of `POST /executions`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExecutionRequest {
    /// Quiz to run.
    pub quiz_id: QuizId,
    /// User hosting the run.
    pub host_id: UserId,
}

/// Response of `POST /executions`.
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateExecutionResponse {
    /// Join code.
    pub code: String,
}

/// The quiz server.
pub struct QuizzerServer {
    config: Arc<ServerConfig>,
    registry: Arc<ExecutionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl QuizzerServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, registry: Arc<ExecutionRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/executions", post(create_execution_handler))
            .route("/ws/{code}", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and serve in a background task until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, "quizzer server listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
            {
                warn!(error = %e, "server stopped with error");
            }
        });
        Ok((addr, handle))
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the execution registry.
    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.registry.len()))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// POST /executions
async fn create_execution_handler(
    State(state): State<AppState>,
    body: Result<Json<CreateExecutionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateExecutionResponse>), ApiError> {
    if state.shutdown.is_shutting_down() {
        return Err(ApiError::ShuttingDown);
    }
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let code = state
        .registry
        .create_execution(&req.quiz_id, &req.host_id)
        .await?;
    Ok((StatusCode::CREATED, Json(CreateExecutionResponse { code })))
}

/// GET /ws/{code}
///
/// The execution is resolved before the upgrade so an unknown code gets a
/// plain 404.
async fn ws_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return ApiError::ShuttingDown.into_response();
    }
    let session = match state.registry.get_execution(&code) {
        Ok(session) => session,
        Err(e) => return ApiError::from(e).into_response(),
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let config = Arc::clone(&state.config);
    let shutdown = state.shutdown.token();
    ws.max_message_size(config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, session, config, shutdown))
}
