//! Research source records and citation formatting.
//!
//! A `Source` is one piece of retrieved evidence. Its identity fields are
//! fixed at construction; only triangulation may touch its credibility and
//! verification status.

use crate::error::{ResearchError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of research source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// General web page.
    #[default]
    Web,
    /// Academic paper (arXiv, journals, ...).
    Academic,
    /// Documentation or technical reference.
    Documentation,
    /// Source code or repository content.
    Code,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Web => "web",
            SourceType::Academic => "academic",
            SourceType::Documentation => "documentation",
            SourceType::Code => "code",
        }
    }
}

impl FromStr for SourceType {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "web" => Ok(SourceType::Web),
            "academic" => Ok(SourceType::Academic),
            "documentation" => Ok(SourceType::Documentation),
            "code" => Ok(SourceType::Code),
            other => Err(ResearchError::InvalidEnumValue {
                kind: "source_type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-source verification status of a source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    /// Corroborated by at least one independent source.
    Verified,
    /// Contradicted by at least one independent source.
    Conflicted,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Conflicted => "conflicted",
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unverified" => Ok(VerificationStatus::Unverified),
            "verified" => Ok(VerificationStatus::Verified),
            "conflicted" => Ok(VerificationStatus::Conflicted),
            other => Err(ResearchError::InvalidEnumValue {
                kind: "verification_status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw item returned by a retrieval capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawEvidence {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Source type identifier; `None` means `web`.
    #[serde(default)]
    pub source_type: Option<String>,
}

impl RawEvidence {
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            source_type: None,
        }
    }

    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }
}

/// A source of evidence discovered during research.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    url: String,
    title: String,
    snippet: String,
    retrieved_at: String,
    #[serde(default)]
    credibility_score: f64,
    #[serde(default)]
    source_type: SourceType,
    #[serde(default)]
    verification_status: VerificationStatus,
}

impl Source {
    /// Create an unverified web source.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
        retrieved_at: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            retrieved_at: retrieved_at.into(),
            credibility_score: 0.0,
            source_type: SourceType::default(),
            verification_status: VerificationStatus::default(),
        }
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    /// Build a source from a retrieval item, stamped with the current time.
    pub fn from_evidence(evidence: RawEvidence) -> Result<Self> {
        let source_type = match evidence.source_type.as_deref() {
            Some(s) => s.parse()?,
            None => SourceType::Web,
        };
        Ok(Self::new(
            evidence.url,
            evidence.title,
            evidence.snippet,
            Utc::now().to_rfc3339(),
        )
        .with_source_type(source_type))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn snippet(&self) -> &str {
        &self.snippet
    }

    pub fn retrieved_at(&self) -> &str {
        &self.retrieved_at
    }

    pub fn credibility_score(&self) -> f64 {
        self.credibility_score
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn verification_status(&self) -> VerificationStatus {
        self.verification_status
    }

    /// Host part of the URL, lowercased. `None` for unparseable URLs.
    pub fn domain(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
    }

    /// Format this source as a reference entry at the given 1-based position.
    pub fn to_citation(&self, index: usize) -> String {
        format!(
            "[{index}] {} - {} (Retrieved: {})",
            self.title, self.url, self.retrieved_at
        )
    }

    /// Only the engine calls this, while executing TRIANGULATE.
    pub(crate) fn apply_assessment(&mut self, credibility_score: f64, status: VerificationStatus) {
        self.credibility_score = credibility_score;
        self.verification_status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_source() -> Source {
        Source::new(
            "https://www.example.com/paper",
            "Example Paper",
            "An excerpt",
            "2026-01-02T03:04:05+00:00",
        )
    }

    #[test]
    fn test_defaults() {
        let source = make_source();
        assert_eq!(source.credibility_score(), 0.0);
        assert_eq!(source.source_type(), SourceType::Web);
        assert_eq!(source.verification_status(), VerificationStatus::Unverified);
    }

    #[test]
    fn test_citation_format() {
        let source = make_source();
        assert_eq!(
            source.to_citation(1),
            "[1] Example Paper - https://www.example.com/paper (Retrieved: 2026-01-02T03:04:05+00:00)"
        );
    }

    #[test]
    fn test_citation_is_pure() {
        let source = make_source();
        let before = source.clone();
        let a = source.to_citation(3);
        let b = source.to_citation(3);
        assert_eq!(a, b);
        assert_eq!(source, before);

        let c = source.to_citation(12);
        assert_eq!(a.trim_start_matches("[3]"), c.trim_start_matches("[12]"));
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("academic".parse::<SourceType>().unwrap(), SourceType::Academic);
        assert_eq!(
            "conflicted".parse::<VerificationStatus>().unwrap(),
            VerificationStatus::Conflicted
        );
        let err = "blog".parse::<SourceType>().unwrap_err();
        assert!(matches!(
            err,
            ResearchError::InvalidEnumValue { kind: "source_type", .. }
        ));
        assert!("maybe".parse::<VerificationStatus>().is_err());
    }

    #[test]
    fn test_from_evidence() {
        let source = Source::from_evidence(
            RawEvidence::new("https://docs.rs/tokio", "tokio docs", "runtime")
                .with_source_type("documentation"),
        )
        .unwrap();
        assert_eq!(source.source_type(), SourceType::Documentation);
        assert!(chrono::DateTime::parse_from_rfc3339(source.retrieved_at()).is_ok());

        let default_type =
            Source::from_evidence(RawEvidence::new("https://a.com", "A", "s")).unwrap();
        assert_eq!(default_type.source_type(), SourceType::Web);
    }

    #[test]
    fn test_from_evidence_rejects_unknown_type() {
        let result = Source::from_evidence(
            RawEvidence::new("https://a.com", "A", "s").with_source_type("podcast"),
        );
        assert!(matches!(
            result,
            Err(ResearchError::InvalidEnumValue { value, .. }) if value == "podcast"
        ));
    }

    #[test]
    fn test_domain() {
        assert_eq!(make_source().domain().as_deref(), Some("example.com"));
        let bad = Source::new("not a url", "t", "s", "now");
        assert!(bad.domain().is_none());
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_value(make_source()).unwrap();
        let obj = json.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "credibility_score",
                "retrieved_at",
                "snippet",
                "source_type",
                "title",
                "url",
                "verification_status"
            ]
        );
        assert_eq!(obj["source_type"], "web");
        assert_eq!(obj["verification_status"], "unverified");
    }

    #[test]
    fn test_deserialize_rejects_unknown_status() {
        let json = r#"{"url":"u","title":"t","snippet":"s","retrieved_at":"r",
            "credibility_score":0.5,"source_type":"web","verification_status":"bogus"}"#;
        assert!(serde_json::from_str::<Source>(json).is_err());
    }
}
