//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::pipeline::{PipelineStage, RunOptions};

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Defaults used when launching a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pipeline id to run.  `None` runs the preferred pipeline.
    pub pipeline: Option<String>,
    /// First stage of the run.  `stt` means the run is fed audio.
    pub start_stage: PipelineStage,
    /// Last stage of the run.
    pub end_stage: PipelineStage,
    /// Sample rate announced for audio input, in Hz.
    pub sample_rate: u32,
    /// Conversation to continue, if any.
    pub conversation_id: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            pipeline: None,
            start_stage: PipelineStage::Stt,
            end_stage: PipelineStage::Tts,
            sample_rate: 16_000,
            conversation_id: None,
        }
    }
}

impl RunConfig {
    /// Build launch options from these defaults.
    ///
    /// `text` is used as input when the run starts after STT; it is ignored
    /// for audio runs.
    pub fn to_options(&self, text: Option<&str>) -> RunOptions {
        let mut options = match self.start_stage {
            PipelineStage::Stt => RunOptions::audio(self.sample_rate, self.end_stage),
            stage => RunOptions::text(stage, text.unwrap_or_default(), self.end_stage),
        };
        options.pipeline = self.pipeline.clone();
        options.conversation_id = self.conversation_id.clone();
        options
    }
}

// ---------------------------------------------------------------------------
// LogConfig
// ---------------------------------------------------------------------------

/// Logging settings.  `RUST_LOG` still takes precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter passed to `env_logger` (e.g. `"info"`, `"assist_pipeline=debug"`).
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use assist_pipeline::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Run launch defaults.
    pub run: RunConfig,
    /// Logging settings.
    pub log: LogConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
