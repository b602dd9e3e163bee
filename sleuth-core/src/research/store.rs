//! Durable research state storage.
//!
//! Saves are retried with a linear backoff (attempt `n` waits `n * step`
//! before attempt `n + 1`; the last attempt never waits). Every I/O error is
//! treated as transient. Loads are never retried.

use super::sequencer::PhaseSequencer;
use super::state::{ResearchMode, ResearchPhase, ResearchState};
use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, ResearchError, Result};
use crate::persistence::{FsBackend, StorageBackend};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Saves and loads `ResearchState` documents through a storage backend.
#[derive(Clone)]
pub struct StatePersistence {
    backend: Arc<dyn StorageBackend>,
    max_attempts: u32,
    backoff_step: Duration,
}

impl StatePersistence {
    pub fn new(backend: Arc<dyn StorageBackend>, config: &PersistenceConfig) -> Self {
        Self {
            backend,
            max_attempts: config.max_attempts.max(1),
            backoff_step: config.backoff_step(),
        }
    }

    /// Filesystem-backed persistence honoring `atomic_writes`.
    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self::new(Arc::new(FsBackend::new(config.atomic_writes)), config)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Serialize `state` as pretty JSON and overwrite `path`.
    ///
    /// Backoff waits end early if `cancel` fires.
    pub async fn save(
        &self,
        state: &ResearchState,
        path: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), PersistenceError> {
        let data: Arc<[u8]> = serde_json::to_vec_pretty(state)?.into();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.write_blocking(path, Arc::clone(&data)).await {
                Ok(()) => {
                    debug!(path = %path.display(), attempt, bytes = data.len(), "Saved research state");
                    return Ok(());
                }
                Err(source) if attempt >= self.max_attempts => {
                    return Err(PersistenceError::SaveFailed {
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    let wait = self.backoff_step * attempt;
                    warn!(
                        path = %path.display(),
                        attempt,
                        max = self.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "State save failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(PersistenceError::Cancelled { attempts: attempt });
                        }
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    /// Run one backend write on the blocking pool.
    async fn write_blocking(&self, path: &Path, data: Arc<[u8]>) -> io::Result<()> {
        let backend = Arc::clone(&self.backend);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || backend.write(&path, &data))
            .await
            .map_err(io::Error::other)?
    }

    /// Load a state document, re-validating its mode and phase.
    pub fn load(&self, path: &Path) -> Result<ResearchState> {
        let text = self
            .backend
            .read(path)
            .map_err(|source| PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| PersistenceError::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if !value.is_object() {
            return Err(PersistenceError::Malformed {
                path: path.to_path_buf(),
                message: "expected a JSON object".to_string(),
            }
            .into());
        }

        let state: ResearchState =
            serde_json::from_value(value).map_err(|e| ResearchError::Deserialization {
                message: e.to_string(),
            })?;

        PhaseSequencer::new(state.mode(), 0).ensure_contains(state.phase())?;
        Ok(state)
    }

    /// Summaries of every loadable `*.json` state in `dir`, newest first.
    pub fn list_sessions(&self, dir: &Path) -> Vec<SessionSummary> {
        let paths = match self.backend.list(dir) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot list session directory");
                return Vec::new();
            }
        };

        let mut summaries: Vec<SessionSummary> = paths
            .into_iter()
            .filter(|path| path.extension().map(|e| e == "json").unwrap_or(false))
            .filter_map(|path| match self.load(&path) {
                Ok(state) => Some(SessionSummary::from_state(&state, path)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable session file");
                    None
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.started_at_parsed().cmp(&a.started_at_parsed()));
        summaries
    }
}

/// Summary of a saved research session for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Option<String>,
    pub query: String,
    pub mode: ResearchMode,
    pub phase: ResearchPhase,
    pub source_count: usize,
    pub started_at: Option<String>,
    pub complete: bool,
    pub path: PathBuf,
}

impl SessionSummary {
    fn from_state(state: &ResearchState, path: PathBuf) -> Self {
        Self {
            session_id: state.session_id().map(str::to_string),
            query: state.query().to_string(),
            mode: state.mode(),
            phase: state.phase(),
            source_count: state.sources().len(),
            started_at: state.started_at().map(str::to_string),
            complete: state.is_complete(),
            path,
        }
    }

    fn started_at_parsed(&self) -> Option<DateTime<FixedOffset>> {
        self.started_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }
}
