//! # quizzer-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`QuizzerSettings::default()`]
//! 2. **Settings file**: `~/.quizzer/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `QUIZZER_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = QuizzerSettings::default();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.execution.auto_advance_interval_ms, 2_000);
        assert_eq!(settings.execution.session_ttl_secs, 3_600);
        assert_eq!(settings.execution.code_attempts, 100);
        assert_eq!(settings.execution.code_digits, 6);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.store.fixtures_path.is_none());
    }
}
