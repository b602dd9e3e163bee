//! Research synthesis and critique.
//!
//! `HeuristicSynthesizer` merges findings and sources into a synthesis
//! document (summary, key findings, confidence, gaps). `HeuristicCritic`
//! reviews a synthesis and lists the issues a refinement pass should address.

use super::capabilities::{CapabilityResult, Critic, Synthesizer};
use super::sources::{Source, VerificationStatus};
use super::state::Document;
use async_trait::async_trait;
use serde_json::{Value, json};

/// Text fields checked, in order, when turning a finding into a key point.
const FINDING_TEXT_FIELDS: &[&str] = &["claim", "text", "summary", "description"];

/// Synthesizes findings and sources into a structured summary.
pub struct HeuristicSynthesizer {
    /// Maximum number of key findings to keep.
    max_key_findings: usize,
}

impl HeuristicSynthesizer {
    pub fn new() -> Self {
        Self {
            max_key_findings: 10,
        }
    }

    fn key_findings(&self, findings: &[Document], sources: &[Source]) -> Vec<String> {
        let mut points: Vec<String> = findings
            .iter()
            .filter_map(|f| describe_finding(f, sources))
            .collect();

        if points.is_empty() {
            // No findings yet: fall back to the most credible snippets.
            let mut ranked: Vec<(usize, &Source)> = sources.iter().enumerate().collect();
            ranked.sort_by(|a, b| b.1.credibility_score().total_cmp(&a.1.credibility_score()));
            points = ranked
                .into_iter()
                .filter(|(_, s)| !s.snippet().trim().is_empty())
                .map(|(i, s)| format!("{} [{}]", s.snippet().trim(), i + 1))
                .collect();
        }

        points.truncate(self.max_key_findings);
        points
    }
}

impl Default for HeuristicSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for HeuristicSynthesizer {
    async fn synthesize(
        &self,
        findings: &[Document],
        sources: &[Source],
    ) -> CapabilityResult<Document> {
        let tally = Tally::of(sources);
        let key_findings = self.key_findings(findings, sources);

        let summary = if sources.is_empty() {
            "No sources were retrieved.".to_string()
        } else {
            format!(
                "Drew on {} sources ({} verified, {} conflicted, {} unverified).",
                sources.len(),
                tally.verified,
                tally.conflicted,
                tally.unverified
            )
        };

        let mut doc = Document::new();
        doc.insert("summary".into(), Value::String(summary));
        doc.insert("key_findings".into(), json!(key_findings));
        doc.insert("confidence".into(), json!(tally.confidence()));
        doc.insert("gaps".into(), json!(tally.gaps()));
        doc.insert("sources_used".into(), json!(sources.len()));
        doc.insert("revision".into(), json!(0));
        Ok(doc)
    }

    async fn refine(
        &self,
        synthesis: &Document,
        critique: &Document,
        findings: &[Document],
        sources: &[Source],
    ) -> CapabilityResult<Document> {
        let mut refined = self.synthesize(findings, sources).await?;
        let revision = synthesis
            .get("revision")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            + 1;
        refined.insert("revision".into(), json!(revision));
        if let Some(issues) = critique.get("issues") {
            refined.insert("addressed_issues".into(), issues.clone());
        }
        Ok(refined)
    }
}

/// Reviews a synthesis for weak spots.
pub struct HeuristicCritic {
    /// Confidence below which the synthesis is flagged.
    min_confidence: f64,
}

impl HeuristicCritic {
    pub fn new() -> Self {
        Self {
            min_confidence: 0.5,
        }
    }
}

impl Default for HeuristicCritic {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Critic for HeuristicCritic {
    async fn critique(
        &self,
        synthesis: &Document,
        findings: &[Document],
    ) -> CapabilityResult<Document> {
        let mut issues: Vec<String> = synthesis
            .get("gaps")
            .and_then(Value::as_array)
            .map(|gaps| {
                gaps.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let confidence = synthesis
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        if confidence < self.min_confidence {
            issues.push(format!(
                "Low overall confidence ({:.0}%)",
                confidence * 100.0
            ));
        }

        let conflicts = findings
            .iter()
            .filter(|f| f.get("relation").and_then(Value::as_str) == Some("conflicts"))
            .count();
        if conflicts > 0 {
            issues.push(format!(
                "{conflicts} conflicting cross-references need resolution"
            ));
        }

        let key_findings = synthesis
            .get("key_findings")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        if key_findings == 0 {
            issues.push("Synthesis has no key findings".to_string());
        }

        let mut doc = Document::new();
        doc.insert("needs_more_research".into(), json!(!issues.is_empty()));
        doc.insert("confidence".into(), json!(confidence));
        doc.insert("issues".into(), json!(issues));
        Ok(doc)
    }
}

/// Verification counts across a source set.
struct Tally {
    total: usize,
    verified: usize,
    conflicted: usize,
    unverified: usize,
    mean_credibility: f64,
}

impl Tally {
    fn of(sources: &[Source]) -> Self {
        let count = |status| {
            sources
                .iter()
                .filter(|s| s.verification_status() == status)
                .count()
        };
        let mean_credibility = if sources.is_empty() {
            0.0
        } else {
            sources.iter().map(Source::credibility_score).sum::<f64>() / sources.len() as f64
        };
        Self {
            total: sources.len(),
            verified: count(VerificationStatus::Verified),
            conflicted: count(VerificationStatus::Conflicted),
            unverified: count(VerificationStatus::Unverified),
            mean_credibility,
        }
    }

    fn confidence(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let verified_ratio = self.verified as f64 / self.total as f64;
        let conflict_penalty = self.conflicted as f64 * 0.05;
        let raw = self.mean_credibility * 0.4 + verified_ratio * 0.6 - conflict_penalty;
        (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
    }

    fn gaps(&self) -> Vec<String> {
        let mut gaps = Vec::new();
        if self.total < 3 {
            gaps.push("Limited source diversity (fewer than 3 sources)".to_string());
        }
        if self.unverified > 0 {
            gaps.push(format!("{} sources remain unverified", self.unverified));
        }
        if self.conflicted > 0 {
            gaps.push(format!(
                "{} sources conflict with other evidence",
                self.conflicted
            ));
        }
        gaps
    }
}

/// One-line description of a finding, citing sources by 1-based index.
fn describe_finding(finding: &Document, sources: &[Source]) -> Option<String> {
    if let Some(text) = FINDING_TEXT_FIELDS
        .iter()
        .find_map(|k| finding.get(*k).and_then(Value::as_str))
    {
        return Some(text.to_string());
    }

    if finding.get("kind").and_then(Value::as_str) == Some("cross_reference") {
        let pair = finding.get("sources")?.as_array()?;
        let a = pair.first()?.as_u64()? as usize;
        let b = pair.get(1)?.as_u64()? as usize;
        let relation = finding.get("relation").and_then(Value::as_str)?;
        let title = |i: usize| sources.get(i).map(Source::title).unwrap_or("unknown source");
        return Some(format!(
            "{} [{}] {relation} {} [{}]",
            title(a),
            a + 1,
            title(b),
            b + 1
        ));
    }

    None
}
