//! Capability traits the engine invokes at each phase.
//!
//! Retrieval, triangulation, synthesis, critique and packaging are injected
//! as trait objects so alternate implementations (network-backed, LLM-backed,
//! mocks) can be swapped without touching the engine.

use super::output::ReportPackager;
use super::sources::{RawEvidence, Source, VerificationStatus};
use super::state::Document;
use super::synthesis::{HeuristicCritic, HeuristicSynthesizer};
use super::triangulation::HeuristicTriangulator;
use crate::error::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result alias for capability calls.
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// SCOPE: frame the question.
#[async_trait]
pub trait Scoper: Send + Sync {
    async fn scope(&self, query: &str) -> CapabilityResult<Document>;
}

/// PLAN: lay out the retrieval strategy.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, query: &str, scope: &Document) -> CapabilityResult<Document>;
}

/// RETRIEVE: fetch raw evidence.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        scope: &Document,
        plan: &Document,
    ) -> CapabilityResult<Vec<RawEvidence>>;
}

/// Credibility and verification verdict for one source, by retrieval index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceAssessment {
    pub index: usize,
    pub credibility_score: f64,
    pub verification_status: VerificationStatus,
}

/// What a triangulation pass produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangulationOutcome {
    pub assessments: Vec<SourceAssessment>,
    /// Findings appended after the existing ones.
    pub findings: Vec<Document>,
}

/// TRIANGULATE: cross-check sources.
#[async_trait]
pub trait Triangulator: Send + Sync {
    async fn triangulate(
        &self,
        sources: &[Source],
        findings: &[Document],
    ) -> CapabilityResult<TriangulationOutcome>;
}

/// SYNTHESIZE and REFINE.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        findings: &[Document],
        sources: &[Source],
    ) -> CapabilityResult<Document>;

    /// Revise a synthesis in light of a critique. Re-synthesizes by default.
    async fn refine(
        &self,
        _synthesis: &Document,
        _critique: &Document,
        findings: &[Document],
        sources: &[Source],
    ) -> CapabilityResult<Document> {
        self.synthesize(findings, sources).await
    }
}

/// CRITIQUE: review a synthesis.
#[async_trait]
pub trait Critic: Send + Sync {
    async fn critique(
        &self,
        synthesis: &Document,
        findings: &[Document],
    ) -> CapabilityResult<Document>;
}

/// PACKAGE: render the final report.
#[async_trait]
pub trait Packager: Send + Sync {
    async fn package(
        &self,
        synthesis: &Document,
        sources: &[Source],
        critique: &Document,
    ) -> CapabilityResult<String>;
}

/// Scoper that records nothing beyond the query.
pub struct NoOpScoper;

#[async_trait]
impl Scoper for NoOpScoper {
    async fn scope(&self, _query: &str) -> CapabilityResult<Document> {
        Ok(Document::new())
    }
}

/// Planner that leaves the plan empty.
pub struct NoOpPlanner;

#[async_trait]
impl Planner for NoOpPlanner {
    async fn plan(&self, _query: &str, _scope: &Document) -> CapabilityResult<Document> {
        Ok(Document::new())
    }
}

/// The set of capabilities handed to the engine for each phase.
#[derive(Clone)]
pub struct Capabilities {
    pub scoper: Arc<dyn Scoper>,
    pub planner: Arc<dyn Planner>,
    pub retriever: Arc<dyn Retriever>,
    pub triangulator: Arc<dyn Triangulator>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub critic: Arc<dyn Critic>,
    pub packager: Arc<dyn Packager>,
}

impl Capabilities {
    /// Built-in capabilities around the given retriever.
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            scoper: Arc::new(NoOpScoper),
            planner: Arc::new(NoOpPlanner),
            retriever,
            triangulator: Arc::new(HeuristicTriangulator::new()),
            synthesizer: Arc::new(HeuristicSynthesizer::new()),
            critic: Arc::new(HeuristicCritic::new()),
            packager: Arc::new(ReportPackager::new()),
        }
    }

    pub fn with_scoper(mut self, scoper: Arc<dyn Scoper>) -> Self {
        self.scoper = scoper;
        self
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_triangulator(mut self, triangulator: Arc<dyn Triangulator>) -> Self {
        self.triangulator = triangulator;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_critic(mut self, critic: Arc<dyn Critic>) -> Self {
        self.critic = critic;
        self
    }

    pub fn with_packager(mut self, packager: Arc<dyn Packager>) -> Self {
        self.packager = packager;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyRetriever;

    #[async_trait]
    impl Retriever for EmptyRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            _scope: &Document,
            _plan: &Document,
        ) -> CapabilityResult<Vec<RawEvidence>> {
            Ok(vec![])
        }
    }

    struct CountingSynthesizer;

    #[async_trait]
    impl Synthesizer for CountingSynthesizer {
        async fn synthesize(
            &self,
            findings: &[Document],
            sources: &[Source],
        ) -> CapabilityResult<Document> {
            let mut doc = Document::new();
            doc.insert("findings".into(), findings.len().into());
            doc.insert("sources".into(), sources.len().into());
            Ok(doc)
        }
    }

    #[tokio::test]
    async fn test_noop_defaults() {
        assert!(NoOpScoper.scope("q").await.unwrap().is_empty());
        assert!(NoOpPlanner.plan("q", &Document::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refine_defaults_to_synthesize() {
        let synth = CountingSynthesizer;
        let findings = vec![Document::new(), Document::new()];
        let refined = synth
            .refine(&Document::new(), &Document::new(), &findings, &[])
            .await
            .unwrap();
        assert_eq!(refined["findings"], 2);
        assert_eq!(refined["sources"], 0);
    }

    #[tokio::test]
    async fn test_builder_overrides() {
        let caps = Capabilities::new(Arc::new(EmptyRetriever))
            .with_synthesizer(Arc::new(CountingSynthesizer));
        let doc = caps.synthesizer.synthesize(&[], &[]).await.unwrap();
        assert_eq!(doc["findings"], 0);
        assert!(caps.retriever.retrieve("q", &Document::new(), &Document::new()).await.unwrap().is_empty());
    }
}
