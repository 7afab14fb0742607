//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`QuizzerSettings::default()`]
//! 2. If `~/.quizzer/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `QUIZZER_*` environment overrides
//! 4. Validate cross-field constraints
//!
//! Objects merge recursively, arrays and primitives are replaced, and null
//! values in the file leave the default untouched.

use std::path::{Path, PathBuf};

use quizzer_core::logging::LogFormat;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::QuizzerSettings;

/// Resolve the path to the settings file (`~/.quizzer/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".quizzer").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<QuizzerSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<QuizzerSettings> {
    let defaults = serde_json::to_value(QuizzerSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: QuizzerSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `QUIZZER_*` environment overrides.
///
/// Unparseable or out-of-range values are logged and ignored.
pub fn apply_env_overrides(settings: &mut QuizzerSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

fn apply_overrides_from(settings: &mut QuizzerSettings, get: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { get };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("QUIZZER_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u64("QUIZZER_PORT", 0, u64::from(u16::MAX)) {
        settings.server.port = u16::try_from(v).unwrap_or(settings.server.port);
    }
    if let Some(v) = env.u64("QUIZZER_PING_INTERVAL_SECS", 1, 3_600) {
        settings.server.ping_interval_secs = v;
    }

    // ── Execution ───────────────────────────────────────────────────
    if let Some(v) = env.u64("QUIZZER_AUTO_ADVANCE_MS", 10, 600_000) {
        settings.execution.auto_advance_interval_ms = v;
    }
    if let Some(v) = env.u64("QUIZZER_SWEEP_INTERVAL_MS", 10, 3_600_000) {
        settings.execution.sweep_interval_ms = v;
    }
    if let Some(v) = env.u64("QUIZZER_SESSION_TTL_SECS", 1, 604_800) {
        settings.execution.session_ttl_secs = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("QUIZZER_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("QUIZZER_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => warn!(key = "QUIZZER_LOG_FORMAT", value = %v, "unknown log format, ignoring"),
        }
    }

    // ── Store ───────────────────────────────────────────────────────
    if let Some(v) = env.string("QUIZZER_FIXTURES") {
        settings.store.fixtures_path = Some(v);
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log format name (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "compact" | "text" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

struct EnvReader<F> {
    get: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.get)(name).filter(|v| !v.is_empty())
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.get)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    }
}
