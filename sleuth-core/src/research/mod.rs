//! Phased research pipeline.
//!
//! A session moves through up to eight phases, depending on its mode:
//! 1. **Scope**: frame the question
//! 2. **Plan**: lay out a retrieval strategy
//! 3. **Retrieve**: collect sources
//! 4. **Triangulate**: cross-check sources, score credibility
//! 5. **Synthesize**: merge findings into a summary
//! 6. **Critique**: review the synthesis
//! 7. **Refine**: revise it (ultradeep mode may loop back to Retrieve)
//! 8. **Package**: render the cited report
//!
//! State is persisted after every phase so a session can be resumed.

pub mod capabilities;
pub mod engine;
pub mod output;
pub mod sequencer;
pub mod sources;
pub mod state;
pub mod store;
pub mod synthesis;
pub mod triangulation;

pub use capabilities::{
    Capabilities, CapabilityResult, Critic, NoOpPlanner, NoOpScoper, Packager, Planner,
    Retriever, Scoper, SourceAssessment, Synthesizer, Triangulator, TriangulationOutcome,
};
pub use engine::{NoOpResearchCallback, ResearchCallback, ResearchEngine};
pub use output::ReportPackager;
pub use sequencer::{PhaseSequencer, Transition};
pub use sources::{RawEvidence, Source, SourceType, VerificationStatus};
pub use state::{Document, ResearchMode, ResearchPhase, ResearchState};
pub use store::{SessionSummary, StatePersistence};
pub use synthesis::{HeuristicCritic, HeuristicSynthesizer};
pub use triangulation::HeuristicTriangulator;
