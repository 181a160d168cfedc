//! Engine configuration.
//!
//! All tunables are centralized here and loadable from a TOML file. Missing
//! or invalid entries fall back to defaults so the engine can always start.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lowest playback rate accepted by [`EngineConfig`] and `set_rate`.
pub const MIN_RATE: f32 = 0.5;
/// Highest playback rate accepted by [`EngineConfig`] and `set_rate`.
pub const MAX_RATE: f32 = 2.0;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// BCP 47 tag preferred when choosing a narration voice.
    pub preferred_language: String,
    /// Initial playback rate; clamped to `[MIN_RATE, MAX_RATE]`.
    pub rate: f32,
    /// Interval between voice-catalog polls while waiting for readiness.
    pub voice_poll_interval_ms: u64,
    /// Give up waiting for the voice catalog after this long and proceed
    /// with the engine's default voice.
    pub voice_wait_deadline_ms: u64,
    /// Settle delay after `stop()` so a cancellation callback cannot race a
    /// fresh `start()`.
    pub stop_settle_ms: u64,
    /// Center the first highlight marker in the viewport instead of merely
    /// bringing it into view.
    pub center_highlight: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            preferred_language: defaults::preferred_language(),
            rate: defaults::rate(),
            voice_poll_interval_ms: defaults::voice_poll_interval_ms(),
            voice_wait_deadline_ms: defaults::voice_wait_deadline_ms(),
            stop_settle_ms: defaults::stop_settle_ms(),
            center_highlight: defaults::center_highlight(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `path`, falling back to defaults on any error.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<EngineConfig>(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded engine config");
                    config.sanitized()
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "Invalid engine config TOML: {err}");
                    EngineConfig::default()
                }
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), "Falling back to default engine config: {err}");
                EngineConfig::default()
            }
        }
    }

    fn sanitized(mut self) -> Self {
        self.rate = self.rate.clamp(MIN_RATE, MAX_RATE);
        self.voice_poll_interval_ms = self.voice_poll_interval_ms.max(1);
        self
    }
}

mod defaults {
    pub fn preferred_language() -> String {
        "pt-BR".to_string()
    }

    pub fn rate() -> f32 {
        1.0
    }

    pub fn voice_poll_interval_ms() -> u64 {
        200
    }

    pub fn voice_wait_deadline_ms() -> u64 {
        4_000
    }

    pub fn stop_settle_ms() -> u64 {
        120
    }

    pub fn center_highlight() -> bool {
        true
    }
}

impl EngineConfig {
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        EngineConfig {
            stop_settle_ms: 0,
            voice_poll_interval_ms: 1,
            voice_wait_deadline_ms: 0,
            ..EngineConfig::default()
        }
    }
}
