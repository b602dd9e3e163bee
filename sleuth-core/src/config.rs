//! Configuration system for Sleuth.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/sleuth/config.toml` and/or `.sleuth/config.toml`
//! in the workspace directory.

use crate::error::ConfigError;
use crate::research::ResearchMode;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleuthConfig {
    pub research: ResearchConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
}

impl SleuthConfig {
    /// Validate the configuration, returning a list of problems.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.persistence.max_attempts == 0 {
            problems.push("persistence.max_attempts must be at least 1".to_string());
        }
        if self.research.mode == ResearchMode::UltraDeep && self.research.ultradeep_iteration_cap == 0
        {
            problems.push(
                "research.ultradeep_iteration_cap is 0; ultradeep will behave like deep"
                    .to_string(),
            );
        }
        if self.logging.level.trim().is_empty() {
            problems.push("logging.level must not be empty".to_string());
        }
        problems
    }

    /// Fail with every problem `validate` reports.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                message: problems.join("; "),
            })
        }
    }
}

/// Research engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Mode used for new sessions.
    pub mode: ResearchMode,
    /// Maximum RETRIEVE..REFINE loop-backs in ultradeep mode.
    pub ultradeep_iteration_cap: u32,
    /// Where session state files are written. Defaults to the per-user data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            mode: ResearchMode::Standard,
            ultradeep_iteration_cap: 3,
            output_dir: None,
        }
    }
}

impl ResearchConfig {
    /// The configured output directory, or `<data dir>/research_output`.
    pub fn resolve_output_dir(&self) -> Option<PathBuf> {
        self.output_dir.clone().or_else(|| {
            directories::ProjectDirs::from("dev", "sleuth", "sleuth")
                .map(|d| d.data_dir().join("research_output"))
        })
    }
}

/// State persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Total save attempts before giving up.
    pub max_attempts: u32,
    /// Backoff unit; the wait after attempt `n` is `n * backoff_step_ms`.
    pub backoff_step_ms: u64,
    /// Write through a temp file and rename.
    pub atomic_writes: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_ms: 500,
            atomic_writes: true,
        }
    }
}

impl PersistenceConfig {
    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive for the stderr layer.
    pub level: String,
    /// Also write JSON logs to a daily rolling file.
    pub json_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_file: false,
            log_dir: None,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `SLEUTH_`)
/// 3. Workspace-local config (`.sleuth/config.toml`)
/// 4. User config (`~/.config/sleuth/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&SleuthConfig>,
) -> Result<SleuthConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(SleuthConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "sleuth", "sleuth") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".sleuth").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // SLEUTH_RESEARCH__MODE, SLEUTH_PERSISTENCE__MAX_ATTEMPTS, ...
    figment = figment.merge(Env::prefixed("SLEUTH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}
