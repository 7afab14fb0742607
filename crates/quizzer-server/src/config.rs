//! Server configuration.

use std::time::Duration;

use quizzer_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Transport configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Largest accepted inbound message in bytes.
    pub max_message_size: usize,
    /// Per-connection outbound queue depth.
    pub send_queue_capacity: usize,
    /// Interval between server Ping frames, in seconds.
    pub ping_interval_secs: u64,
    /// Silence after which a peer is dropped, in seconds.
    pub pong_timeout_secs: u64,
}

impl ServerConfig {
    /// Ping interval.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    /// Pong timeout.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 64 * 1024,
            send_queue_capacity: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_message_size: s.max_message_size,
            send_queue_capacity: s.send_queue_capacity.max(1),
            ping_interval_secs: s.ping_interval_secs,
            pong_timeout_secs: s.pong_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_zero() {
        assert_eq!(ServerConfig::default().port, 0);
    }

    #[test]
    fn from_settings() {
        let settings = ServerSettings {
            port: 9000,
            send_queue_capacity: 0,
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.send_queue_capacity, 1);
        assert_eq!(cfg.pong_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn ping_interval_never_zero() {
        let cfg = ServerConfig {
            ping_interval_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.ping_interval(), Duration::from_secs(1));
    }
}
