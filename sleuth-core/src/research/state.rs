//! Research session state.
//!
//! `ResearchState` is the aggregate of one research session: the query, the
//! mode, the current phase and everything the phases have produced so far.
//! Identity fields never change after construction and evidence only grows.

use super::sources::Source;
use crate::error::{ResearchError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Free-form key/value structure used for scope, plan, synthesis, critique,
/// metadata and individual findings.
pub type Document = serde_json::Map<String, Value>;

/// Research depth mode, selecting which phases a session runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResearchMode {
    /// Scope, retrieve, package.
    Quick,
    /// Adds planning, triangulation and synthesis.
    #[default]
    Standard,
    /// All eight phases.
    Deep,
    /// All eight phases with repeated refinement cycles.
    UltraDeep,
}

impl ResearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchMode::Quick => "quick",
            ResearchMode::Standard => "standard",
            ResearchMode::Deep => "deep",
            ResearchMode::UltraDeep => "ultradeep",
        }
    }
}

impl FromStr for ResearchMode {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "quick" => Ok(ResearchMode::Quick),
            "standard" => Ok(ResearchMode::Standard),
            "deep" => Ok(ResearchMode::Deep),
            "ultradeep" => Ok(ResearchMode::UltraDeep),
            other => Err(ResearchError::InvalidEnumValue {
                kind: "mode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ResearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage of the research pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResearchPhase {
    /// Frame the question and its boundaries.
    Scope,
    /// Lay out the retrieval strategy.
    Plan,
    /// Gather raw evidence.
    Retrieve,
    /// Cross-check sources against each other.
    Triangulate,
    /// Merge findings into a synthesis.
    Synthesize,
    /// Review the synthesis for weaknesses.
    Critique,
    /// Revise the synthesis using the critique.
    Refine,
    /// Produce the final cited report.
    Package,
}

impl ResearchPhase {
    pub const ALL: [ResearchPhase; 8] = [
        ResearchPhase::Scope,
        ResearchPhase::Plan,
        ResearchPhase::Retrieve,
        ResearchPhase::Triangulate,
        ResearchPhase::Synthesize,
        ResearchPhase::Critique,
        ResearchPhase::Refine,
        ResearchPhase::Package,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchPhase::Scope => "scope",
            ResearchPhase::Plan => "plan",
            ResearchPhase::Retrieve => "retrieve",
            ResearchPhase::Triangulate => "triangulate",
            ResearchPhase::Synthesize => "synthesize",
            ResearchPhase::Critique => "critique",
            ResearchPhase::Refine => "refine",
            ResearchPhase::Package => "package",
        }
    }
}

impl FromStr for ResearchPhase {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        ResearchPhase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ResearchError::InvalidEnumValue {
                kind: "phase",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persistent state of one research session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchState {
    query: String,
    mode: ResearchMode,
    phase: ResearchPhase,
    scope: Document,
    plan: Document,
    sources: Vec<Source>,
    findings: Vec<Document>,
    synthesis: Document,
    critique: Document,
    report: String,
    metadata: Document,
}

impl ResearchState {
    /// Create a fresh session at the SCOPE phase.
    pub fn new(query: impl Into<String>, mode: ResearchMode) -> Self {
        let mut metadata = Document::new();
        metadata.insert("started_at".into(), Value::String(Utc::now().to_rfc3339()));
        metadata.insert(
            "session_id".into(),
            Value::String(Uuid::new_v4().to_string()),
        );

        Self {
            query: query.into(),
            mode,
            phase: ResearchPhase::Scope,
            scope: Document::new(),
            plan: Document::new(),
            sources: Vec::new(),
            findings: Vec::new(),
            synthesis: Document::new(),
            critique: Document::new(),
            report: String::new(),
            metadata,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> ResearchMode {
        self.mode
    }

    pub fn phase(&self) -> ResearchPhase {
        self.phase
    }

    pub fn scope(&self) -> &Document {
        &self.scope
    }

    pub fn plan(&self) -> &Document {
        &self.plan
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn findings(&self) -> &[Document] {
        &self.findings
    }

    pub fn synthesis(&self) -> &Document {
        &self.synthesis
    }

    pub fn critique(&self) -> &Document {
        &self.critique
    }

    pub fn report(&self) -> &str {
        &self.report
    }

    pub fn metadata(&self) -> &Document {
        &self.metadata
    }

    pub fn session_id(&self) -> Option<&str> {
        self.metadata.get("session_id").and_then(Value::as_str)
    }

    pub fn started_at(&self) -> Option<&str> {
        self.metadata.get("started_at").and_then(Value::as_str)
    }

    /// Number of ULTRADEEP refine → retrieve loop-backs taken so far.
    pub fn refine_cycles(&self) -> u32 {
        self.metadata
            .get("refine_cycles")
            .and_then(Value::as_u64)
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0)
    }

    /// The session is finished once PACKAGE has produced a report.
    pub fn is_complete(&self) -> bool {
        self.phase == ResearchPhase::Package && !self.report.is_empty()
    }

    /// Formatted citations for every source, in retrieval order.
    pub fn citations(&self) -> Vec<String> {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, s)| s.to_citation(i + 1))
            .collect()
    }

    pub(crate) fn set_phase(&mut self, phase: ResearchPhase) {
        self.phase = phase;
    }

    pub(crate) fn set_scope(&mut self, scope: Document) {
        self.scope = scope;
    }

    pub(crate) fn set_plan(&mut self, plan: Document) {
        self.plan = plan;
    }

    pub(crate) fn append_sources(&mut self, sources: impl IntoIterator<Item = Source>) {
        self.sources.extend(sources);
    }

    pub(crate) fn sources_mut(&mut self) -> &mut [Source] {
        &mut self.sources
    }

    pub(crate) fn append_findings(&mut self, findings: impl IntoIterator<Item = Document>) {
        self.findings.extend(findings);
    }

    pub(crate) fn set_synthesis(&mut self, synthesis: Document) {
        self.synthesis = synthesis;
    }

    pub(crate) fn set_critique(&mut self, critique: Document) {
        self.critique = critique;
    }

    pub(crate) fn set_report(&mut self, report: String) {
        self.report = report;
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut Document {
        &mut self.metadata
    }
}
