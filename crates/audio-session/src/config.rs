use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

const DEFAULT_IDLE_RELEASE_DELAY_MS: u64 = 1_000;
const DEFAULT_VOICE_CALL_IO_BUFFER_MS: u64 = 5;

pub const IDLE_RELEASE_ENV: &str = "AUDIO_SESSION_IDLE_RELEASE_MS";
pub const VOICE_CALL_IO_BUFFER_ENV: &str = "AUDIO_SESSION_VOICE_CALL_IO_BUFFER_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSessionConfig {
    /// How long the hardware stays claimed after the last playback holder leaves.
    pub idle_release_delay_ms: u64,
    pub voice_call_io_buffer_ms: u64,
}

impl Default for AudioSessionConfig {
    fn default() -> Self {
        Self {
            idle_release_delay_ms: DEFAULT_IDLE_RELEASE_DELAY_MS,
            voice_call_io_buffer_ms: DEFAULT_VOICE_CALL_IO_BUFFER_MS,
        }
    }
}

impl AudioSessionConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("parse audio session config")
    }

    /// Loads `path` if it exists (defaults otherwise), then applies environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json_str(&raw)
                .with_context(|| format!("load audio session config {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read audio session config {}", path.display()))
            }
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = parse_ms(&lookup, IDLE_RELEASE_ENV) {
            self.idle_release_delay_ms = ms;
        }
        if let Some(ms) = parse_ms(&lookup, VOICE_CALL_IO_BUFFER_ENV) {
            self.voice_call_io_buffer_ms = ms;
        }
        self
    }

    pub fn idle_release_delay(&self) -> Duration {
        Duration::from_millis(self.idle_release_delay_ms)
    }

    pub fn voice_call_io_buffer(&self) -> Duration {
        Duration::from_millis(self.voice_call_io_buffer_ms)
    }
}

fn parse_ms(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(err) => {
            tracing::warn!(key, value = %raw, %err, "ignoring invalid audio session override");
            None
        }
    }
}
