//! # Sleuth Core
//!
//! Phased research orchestration: drives a query through scoping, retrieval,
//! triangulation, synthesis, critique and packaging, persisting the research
//! state after every phase.

pub mod config;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod research;

// Re-export commonly used types at the crate root.
pub use config::{LoggingConfig, PersistenceConfig, ResearchConfig, SleuthConfig, load_config};
pub use error::{CapabilityError, ConfigError, PersistenceError, ResearchError, Result};
pub use research::{
    Capabilities, Document, RawEvidence, ResearchCallback, ResearchEngine, ResearchMode,
    ResearchPhase, ResearchState, Source, SourceType, VerificationStatus,
};
