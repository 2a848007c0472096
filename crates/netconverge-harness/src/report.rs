//! Run reports and artifact indexing.
//!
//! A [`SuiteReport`] is the durable record of one harness run: verdict,
//! per-step outcomes, and counts, renderable as Markdown for humans or JSON
//! for tooling. [`ArtifactIndex`] fingerprints the files a run produced so
//! a consumer can detect a stale or tampered artifact set.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use netconverge_core::{PassFailResult, StepRecord, Verdict};

/// Aggregate counts for one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl SuiteSummary {
    #[must_use]
    pub fn from_result(result: &PassFailResult) -> Self {
        Self {
            total: result.steps().len(),
            passed: result.passed_count(),
            failed: result.failed_count(),
        }
    }
}

/// Full report for one suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub title: String,
    pub suite: String,
    pub timestamp: String,
    pub verdict: Verdict,
    pub summary: SuiteSummary,
    pub steps: Vec<StepRecord>,
}

impl SuiteReport {
    #[must_use]
    pub fn new(title: &str, suite: &str, timestamp: &str, result: &PassFailResult) -> Self {
        Self {
            title: title.to_string(),
            suite: suite.to_string(),
            timestamp: timestamp.to_string(),
            verdict: result.verdict(),
            summary: SuiteSummary::from_result(result),
            steps: result.steps().to_vec(),
        }
    }

    /// Render as Markdown with a failure table when anything failed.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Suite: `{}`\n", self.suite));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Verdict: **{}**\n", self.verdict.as_str()));
        out.push_str(&format!(
            "- Steps: {} total, {} passed, {} failed\n\n",
            self.summary.total, self.summary.passed, self.summary.failed
        ));

        if self.summary.failed > 0 {
            out.push_str("## Failures\n\n");
            out.push_str("| Step | Kind | Expected | Observed |\n");
            out.push_str("|------|------|----------|----------|\n");
            for step in self.steps.iter().filter(|s| !s.passed) {
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    escape_cell(&step.step),
                    step.kind.map_or("-", |k| k.as_str()),
                    escape_cell(step.expected.as_deref().unwrap_or("-")),
                    escape_cell(step.observed.as_deref().unwrap_or("-")),
                ));
            }
            out.push('\n');
        }

        out.push_str("## Steps\n\n");
        for step in &self.steps {
            let mark = if step.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!("- [{mark}] {}\n", step.step));
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_markdown(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_markdown())
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// One artifact produced by a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

/// Content fingerprints of every artifact a run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub entries: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a file's contents into the index.
    pub fn add_file(&mut self, path: &Path) -> std::io::Result<()> {
        let content = std::fs::read(path)?;
        self.add_bytes(&path.display().to_string(), &content);
        Ok(())
    }

    /// Record in-memory content under a logical path.
    pub fn add_bytes(&mut self, path: &str, content: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(content);
        self.entries.push(ArtifactEntry {
            path: path.to_string(),
            sha256: format!("{:x}", hasher.finalize()),
            bytes: content.len() as u64,
        });
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netconverge_core::FailureKind;

    fn sample_result() -> PassFailResult {
        let mut result = PassFailResult::new();
        result.record_pass("1.1 Create [ensure => present] :: apply manifest");
        result.record_failure(
            "1.1 Create [ensure => present] :: verify resource state :: timeout => '5'",
            FailureKind::AssertionMismatch,
            "timeout => '5'",
            "not found in: ensure => 'present' | timeout => '30'",
        );
        result
    }

    #[test]
    fn summary_counts_match_the_result() {
        let summary = SuiteSummary::from_result(&sample_result());
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn markdown_carries_verdict_and_failure_table() {
        let report = SuiteReport::new(
            "Convergence Report",
            "cisco_bgp",
            "2026-01-01T00:00:00Z",
            &sample_result(),
        );
        let md = report.to_markdown();
        assert!(md.contains("**FAIL**"));
        assert!(md.contains("| Step | Kind | Expected | Observed |"));
        assert!(md.contains("assertion_mismatch"));
        assert!(md.contains("[PASS] 1.1 Create"));
    }

    #[test]
    fn passing_report_omits_the_failure_table() {
        let mut result = PassFailResult::new();
        result.record_pass("only step");
        let report = SuiteReport::new("Report", "s", "t", &result);
        let md = report.to_markdown();
        assert!(md.contains("**PASS**"));
        assert!(!md.contains("## Failures"));
    }

    #[test]
    fn report_roundtrips_through_json() {
        let report = SuiteReport::new("Report", "cisco_bgp", "t", &sample_result());
        let json = report.to_json().unwrap();
        let restored: SuiteReport = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.verdict, Verdict::Fail);
        assert_eq!(restored.steps.len(), 2);
    }

    #[test]
    fn pipe_characters_are_escaped_in_table_cells() {
        let mut result = PassFailResult::new();
        result.record_failure("step", FailureKind::AssertionMismatch, "a | b", "c");
        let md = SuiteReport::new("R", "s", "t", &result).to_markdown();
        assert!(md.contains("a \\| b"));
    }

    #[test]
    fn artifact_index_hashes_content() {
        let mut index = ArtifactIndex::new();
        index.add_bytes("report.md", b"hello");
        assert_eq!(
            index.entries[0].sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(index.entries[0].bytes, 5);
    }
}
