//! # quizzer-server
//!
//! Axum HTTP + `WebSocket` transport for live quiz executions.
//!
//! - `POST /executions`: start a session, returns its join code
//! - `GET /ws/{code}`: resolve the session, upgrade, and pump frames
//! - `GET /health`, `GET /metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, QuizzerServer};
pub use shutdown::ShutdownCoordinator;
