//! Error types for the Sleuth research core.
//!
//! Uses `thiserror` for public API error types. Domain errors for persistence,
//! capabilities and configuration are wrapped by the top-level `ResearchError`.

use std::path::PathBuf;

/// Top-level error type for the Sleuth core library.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("Invalid {kind} value: '{value}'")]
    InvalidEnumValue { kind: &'static str, value: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Deserialization error: {message}")]
    Deserialization { message: String },

    #[error("Invalid transition: no phase follows '{from}'")]
    InvalidTransition { from: String },

    #[error("Phase '{phase}' is not part of mode '{mode}'")]
    PhaseNotInMode { phase: String, mode: String },

    #[error("Phase mismatch: session is at '{expected}', requested '{requested}'")]
    PhaseMismatch { expected: String, requested: String },

    #[error("Phase '{phase}' failed: {source}")]
    PhaseExecution {
        phase: String,
        #[source]
        source: CapabilityError,
    },

    #[error("No active research session")]
    NoActiveSession,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from saving and loading research state.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to save state after {attempts} attempts: {source}")]
    SaveFailed {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Save cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed state document {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised by injected capabilities (retrieval, synthesis, critique, ...).
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("{message}")]
    Failed { message: String },

    #[error("Invalid capability output: {message}")]
    InvalidOutput { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CapabilityError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },

    #[error("Could not determine a default output directory")]
    NoOutputDir,

    #[error("Cannot write logs to {path}: {message}")]
    LogDir { path: PathBuf, message: String },

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A type alias for results using the top-level `ResearchError`.
pub type Result<T> = std::result::Result<T, ResearchError>;
