//! Research report generation.

use super::capabilities::{CapabilityResult, Packager};
use super::sources::Source;
use super::state::Document;
use async_trait::async_trait;
use serde_json::Value;

/// Renders a markdown report from a synthesis, critique and source list.
pub struct ReportPackager {
    title: String,
}

impl ReportPackager {
    pub fn new() -> Self {
        Self {
            title: "Research Report".to_string(),
        }
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Render the report. Pure: identical inputs give identical output.
    pub fn render(&self, synthesis: &Document, sources: &[Source], critique: &Document) -> String {
        let mut out = format!("# {}\n\n", self.title);

        out.push_str("## Summary\n\n");
        match synthesis.get("summary").and_then(Value::as_str) {
            Some(summary) if !summary.is_empty() => out.push_str(summary),
            _ => out.push_str("No synthesis was produced."),
        }
        out.push('\n');

        let key_findings = string_list(synthesis, "key_findings");
        if !key_findings.is_empty() {
            out.push_str("\n## Key Findings\n\n");
            for (i, finding) in key_findings.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, finding));
            }
        }

        let issues = string_list(critique, "issues");
        if !issues.is_empty() {
            out.push_str("\n## Open Issues\n\n");
            for issue in &issues {
                out.push_str(&format!("- {issue}\n"));
            }
        }

        if let Some(confidence) = synthesis.get("confidence").and_then(Value::as_f64) {
            out.push_str(&format!(
                "\n**Confidence:** {:.0}% | **Sources:** {}\n",
                confidence * 100.0,
                sources.len()
            ));
        }

        out.push_str("\n## References\n\n");
        if sources.is_empty() {
            out.push_str("_No sources retrieved._\n");
        }
        for (i, source) in sources.iter().enumerate() {
            out.push_str(&source.to_citation(i + 1));
            out.push('\n');
        }

        out
    }
}

impl Default for ReportPackager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Packager for ReportPackager {
    async fn package(
        &self,
        synthesis: &Document,
        sources: &[Source],
        critique: &Document,
    ) -> CapabilityResult<String> {
        Ok(self.render(synthesis, sources, critique))
    }
}

fn string_list(doc: &Document, key: &str) -> Vec<String> {
    doc.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    fn sources() -> Vec<Source> {
        vec![
            Source::new("https://first.org", "First", "s", "2026-01-01T00:00:00+00:00"),
            Source::new("https://second.org", "Second", "s", "2026-01-02T00:00:00+00:00"),
        ]
    }

    #[test]
    fn test_render_sections() {
        let synthesis = doc(json!({
            "summary": "Drew on 2 sources.",
            "key_findings": ["Key finding"],
            "confidence": 0.85,
        }));
        let critique = doc(json!({"issues": ["Limited source diversity"]}));
        let report = ReportPackager::new().render(&synthesis, &sources(), &critique);

        assert!(report.starts_with("# Research Report\n"));
        assert!(report.contains("Drew on 2 sources."));
        assert!(report.contains("1. Key finding"));
        assert!(report.contains("- Limited source diversity"));
        assert!(report.contains("85%"));
    }

    #[test]
    fn test_references_in_retrieval_order() {
        let report = ReportPackager::new().render(&Document::new(), &sources(), &Document::new());
        let first = report
            .find("[1] First - https://first.org (Retrieved: 2026-01-01T00:00:00+00:00)")
            .unwrap();
        let second = report
            .find("[2] Second - https://second.org (Retrieved: 2026-01-02T00:00:00+00:00)")
            .unwrap();
        assert!(first < second);
        assert!(report.contains("No synthesis was produced."));
    }

    #[tokio::test]
    async fn test_package_without_sources() {
        let packager = ReportPackager::with_title("Quick Look");
        let report = packager
            .package(&Document::new(), &[], &Document::new())
            .await
            .unwrap();
        assert!(report.starts_with("# Quick Look"));
        assert!(report.contains("_No sources retrieved._"));
    }
}
