//! Settings types.

use std::time::Duration;

use quizzer_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizzerSettings {
    /// HTTP / WebSocket transport.
    pub server: ServerSettings,
    /// Execution engine tuning.
    pub execution: ExecutionSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Collaborator store.
    pub store: StoreSettings,
}

impl QuizzerSettings {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let e = &self.execution;
        if !(4..=9).contains(&e.code_digits) {
            return Err(SettingsError::InvalidValue(format!(
                "execution.codeDigits must be within 4..=9, got {}",
                e.code_digits
            )));
        }
        if e.code_attempts == 0 {
            return Err(SettingsError::InvalidValue(
                "execution.codeAttempts must be at least 1".into(),
            ));
        }
        if e.auto_advance_interval_ms == 0 || e.sweep_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "execution intervals must be non-zero".into(),
            ));
        }
        if e.mailbox_capacity == 0 || self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "queue capacities must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Largest accepted inbound WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue depth.
    pub send_queue_capacity: usize,
    /// Interval between server-initiated Ping frames.
    pub ping_interval_secs: u64,
    /// Silence after which a peer is dropped.
    pub pong_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
        }
    }
}

/// Execution engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionSettings {
    /// How often a session checks whether everyone has answered.
    pub auto_advance_interval_ms: u64,
    /// How often the registry sweeps finished and expired sessions.
    pub sweep_interval_ms: u64,
    /// Maximum session age before the sweep reclaims it.
    pub session_ttl_secs: u64,
    /// Width of the numeric join code.
    pub code_digits: u32,
    /// Draws attempted before code generation gives up.
    pub code_attempts: u32,
    /// Depth of each session's command mailbox.
    pub mailbox_capacity: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            auto_advance_interval_ms: 2_000,
            sweep_interval_ms: 10_000,
            session_ttl_secs: 3_600,
            code_digits: 6,
            code_attempts: 100,
            mailbox_capacity: 256,
        }
    }
}

impl ExecutionSettings {
    /// Auto-advance check interval.
    pub fn auto_advance_interval(&self) -> Duration {
        Duration::from_millis(self.auto_advance_interval_ms)
    }

    /// Registry sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Session time-to-live.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Collaborator store settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// JSON fixture file seeding the in-memory store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixtures_path: Option<String>,
}
