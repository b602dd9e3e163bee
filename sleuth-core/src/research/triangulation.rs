//! Cross-source verification.
//!
//! Compares every pair of sources from different domains using keyword
//! overlap. Overlapping sources corroborate each other unless one negates the
//! other or they disagree on numbers, in which case they conflict.

use super::capabilities::{CapabilityResult, SourceAssessment, Triangulator, TriangulationOutcome};
use super::sources::{Source, SourceType, VerificationStatus};
use super::state::Document;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "shall", "should", "may", "might", "must", "can",
    "could", "of", "in", "to", "for", "with", "on", "at", "from", "by", "about", "as", "into",
    "through", "during", "before", "after", "above", "below", "between", "this", "that", "these",
    "those", "it", "its", "and", "but", "or",
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "neither", "without", "lack", "doesn't", "don't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "cannot", "can't",
];

/// How two sources relate after comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Corroborates,
    Conflicts,
}

impl Relation {
    fn as_str(&self) -> &'static str {
        match self {
            Relation::Corroborates => "corroborates",
            Relation::Conflicts => "conflicts",
        }
    }
}

/// Keyword-overlap triangulation with credibility scoring by source type.
pub struct HeuristicTriangulator {
    /// Minimum Jaccard overlap for two sources to be about the same topic.
    min_overlap: f64,
    /// Overlap above which a negation mismatch counts as a conflict.
    negation_overlap: f64,
    /// Credibility bonus per corroborating source.
    corroboration_bonus: f64,
    /// Credibility penalty for a conflicted source.
    conflict_penalty: f64,
}

impl HeuristicTriangulator {
    pub fn new() -> Self {
        Self {
            min_overlap: 0.3,
            negation_overlap: 0.4,
            corroboration_bonus: 0.1,
            conflict_penalty: 0.2,
        }
    }

    /// Starting credibility for a source before cross-referencing.
    pub fn base_credibility(source_type: SourceType) -> f64 {
        match source_type {
            SourceType::Academic => 0.9,
            SourceType::Documentation => 0.8,
            SourceType::Code => 0.7,
            SourceType::Web => 0.5,
        }
    }

    /// Compare two sources. `None` when they are not about the same thing.
    pub fn compare(&self, a: &Source, b: &Source) -> Option<(Relation, f64)> {
        let text_a = format!("{} {}", a.title(), a.snippet());
        let text_b = format!("{} {}", b.title(), b.snippet());
        let words_a = keywords(&text_a);
        let words_b = keywords(&text_b);

        let overlap = jaccard(&words_a, &words_b);
        if overlap < self.min_overlap {
            return None;
        }

        if has_negation(&text_a) != has_negation(&text_b) && overlap > self.negation_overlap {
            return Some((Relation::Conflicts, overlap));
        }

        let nums_a = numbers(&text_a);
        let nums_b = numbers(&text_b);
        if !nums_a.is_empty() && !nums_b.is_empty() {
            let disjoint = nums_a.iter().all(|na| {
                nums_b
                    .iter()
                    .all(|nb| (na - nb).abs() / na.abs().max(1.0) > 0.1)
            });
            if disjoint {
                return Some((Relation::Conflicts, overlap));
            }
        }

        Some((Relation::Corroborates, overlap))
    }
}

impl Default for HeuristicTriangulator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Triangulator for HeuristicTriangulator {
    async fn triangulate(
        &self,
        sources: &[Source],
        findings: &[Document],
    ) -> CapabilityResult<TriangulationOutcome> {
        let recorded = recorded_pairs(findings);
        let mut corroborations = vec![0usize; sources.len()];
        let mut conflicts = vec![0usize; sources.len()];
        let mut new_findings = Vec::new();

        for i in 0..sources.len() {
            for j in (i + 1)..sources.len() {
                if !independent(&sources[i], &sources[j]) {
                    continue;
                }
                let Some((relation, overlap)) = self.compare(&sources[i], &sources[j]) else {
                    continue;
                };
                match relation {
                    Relation::Corroborates => {
                        corroborations[i] += 1;
                        corroborations[j] += 1;
                    }
                    Relation::Conflicts => {
                        conflicts[i] += 1;
                        conflicts[j] += 1;
                    }
                }
                if !recorded.contains(&(i, j)) {
                    new_findings.push(cross_reference(i, j, relation, overlap));
                }
            }
        }

        let assessments = sources
            .iter()
            .enumerate()
            .map(|(index, source)| {
                let base = Self::base_credibility(source.source_type());
                let (score, status) = if conflicts[index] > 0 {
                    (
                        base - self.conflict_penalty,
                        VerificationStatus::Conflicted,
                    )
                } else if corroborations[index] > 0 {
                    (
                        base + self.corroboration_bonus * corroborations[index] as f64,
                        VerificationStatus::Verified,
                    )
                } else {
                    (base, VerificationStatus::Unverified)
                };
                SourceAssessment {
                    index,
                    credibility_score: score.clamp(0.0, 1.0),
                    verification_status: status,
                }
            })
            .collect();

        Ok(TriangulationOutcome {
            assessments,
            findings: new_findings,
        })
    }
}

/// Two sources are independent when they come from different hosts.
fn independent(a: &Source, b: &Source) -> bool {
    match (a.domain(), b.domain()) {
        (Some(da), Some(db)) => da != db,
        _ => a.url() != b.url(),
    }
}

fn cross_reference(i: usize, j: usize, relation: Relation, overlap: f64) -> Document {
    let value = json!({
        "kind": "cross_reference",
        "relation": relation.as_str(),
        "sources": [i, j],
        "overlap": (overlap * 100.0).round() / 100.0,
    });
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// Source pairs already covered by earlier cross-reference findings.
fn recorded_pairs(findings: &[Document]) -> HashSet<(usize, usize)> {
    findings
        .iter()
        .filter(|f| f.get("kind").and_then(Value::as_str) == Some("cross_reference"))
        .filter_map(|f| {
            let pair = f.get("sources")?.as_array()?;
            let a = pair.first()?.as_u64()? as usize;
            let b = pair.get(1)?.as_u64()? as usize;
            Some((a.min(b), a.max(b)))
        })
        .collect()
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'' && c != '.')
        .map(|w| w.trim_matches(|c: char| c == '\'' || c == '.').to_lowercase())
        .filter(|w| !w.is_empty())
}

/// Lowercased content words, stop words removed.
fn keywords(text: &str) -> HashSet<String> {
    tokens(text)
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| !NEGATIONS.contains(&w.as_str()))
        .collect()
}

fn has_negation(text: &str) -> bool {
    tokens(text).any(|w| NEGATIONS.contains(&w.as_str()))
}

fn numbers(text: &str) -> Vec<f64> {
    tokens(text)
        .filter_map(|w| w.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}
