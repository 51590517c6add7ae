//! Analysis orchestration: extract, embed, score, classify.
//!
//! Each element moves through a fixed sequence of terminal states (extracted,
//! alias embedded, code embedded, scored, then flagged or passed) with no
//! retries at this layer. Elements are processed independently; the outcome of
//! one never affects another. The default failure policy aborts the whole call
//! at the first element that cannot be scored, with that element's identity
//! attached to the error; [`FailurePolicy::Skip`] instead records skipped
//! elements on the report so they are never silently dropped.

use crate::embedding::{Embedder, EmbeddingError};
use crate::error::ParseError;
use crate::extract::extract;
use crate::similarity::{cosine_score, SimilarityError};
use crate::types::{Dialect, Finding, Severity, SimilarityResult, SqlElement};
use serde::{Deserialize, Serialize};
use thiserror::Error;
#[cfg(feature = "tracing")]
use tracing::{debug, warn};

/// Default similarity threshold below which an alias is flagged.
pub const DEFAULT_THRESHOLD: f32 = 0.7;

/// Errors produced by [`Analyzer::analyze`] and friends.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Threshold outside (0, 1]. Raised before any extraction work begins.
    #[error("similarity threshold must be in (0, 1], got {value}")]
    InvalidThreshold { value: f32 },

    /// The statement is not syntactically valid. Surfaced verbatim; no
    /// partial extraction is attempted.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// One element could not be embedded or scored. Carries the identity of
    /// the element that triggered it.
    #[error("cannot score {identity}: {source}")]
    Element {
        identity: String,
        element: SqlElement,
        #[source]
        source: ElementFailure,
    },
}

impl AnalyzeError {
    fn element(element: SqlElement, source: ElementFailure) -> Self {
        Self::Element {
            identity: element.identity(),
            element,
            source,
        }
    }
}

/// What went wrong while scoring a single element.
#[derive(Debug, Error)]
pub enum ElementFailure {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
}

/// How element-level failures are handled. Applied uniformly to every
/// element of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole call at the first element that cannot be scored.
    #[default]
    FailFast,
    /// Skip elements that cannot be scored and record them on the report.
    Skip,
}

/// An element left unscored under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedElement {
    pub element: SqlElement,
    pub reason: String,
}

/// Findings plus bookkeeping about what was (and was not) scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Flagged aliases, source order preserved.
    pub findings: Vec<Finding>,
    /// Number of elements successfully scored.
    pub scored: usize,
    /// Elements skipped under [`FailurePolicy::Skip`]; always empty under
    /// the fail-fast policy.
    pub skipped: Vec<SkippedElement>,
}

/// Drives extraction, embedding, scoring, and classification.
///
/// Borrows the embedding provider from the composition root; constructing an
/// analyzer is free and holds no state between calls.
pub struct Analyzer<'a> {
    embedder: &'a dyn Embedder,
    dialect: Dialect,
    policy: FailurePolicy,
}

impl<'a> Analyzer<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self {
            embedder,
            dialect: Dialect::Generic,
            policy: FailurePolicy::FailFast,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Analyzes one statement and returns the flagged aliases.
    pub fn analyze(&self, sql: &str, threshold: f32) -> Result<Vec<Finding>, AnalyzeError> {
        Ok(self.analyze_with_report(sql, threshold)?.findings)
    }

    /// Like [`Analyzer::analyze`], also reporting scored/skipped counts.
    pub fn analyze_with_report(
        &self,
        sql: &str,
        threshold: f32,
    ) -> Result<AnalysisReport, AnalyzeError> {
        validate_threshold(threshold)?;

        let elements = extract(sql, self.dialect)?;
        #[cfg(feature = "tracing")]
        debug!(
            elements = elements.len(),
            threshold,
            embedder = self.embedder.name(),
            "scoring extracted elements"
        );

        let mut findings = Vec::new();
        let mut skipped = Vec::new();
        let mut scored = 0usize;

        for element in elements {
            match self.score_element(&element) {
                Ok(score) => {
                    scored += 1;
                    if let Some(severity) = Severity::classify(score, threshold) {
                        let finding = build_finding(element, score, severity, threshold);
                        #[cfg(feature = "tracing")]
                        warn!(
                            alias = %finding.alias,
                            score = finding.score,
                            severity = %finding.severity,
                            "alias appears to be a poor name for its code"
                        );
                        findings.push(finding);
                    }
                }
                Err(failure) => match self.policy {
                    FailurePolicy::FailFast => {
                        return Err(AnalyzeError::element(element, failure))
                    }
                    FailurePolicy::Skip => skipped.push(SkippedElement {
                        reason: failure.to_string(),
                        element,
                    }),
                },
            }
        }

        Ok(AnalysisReport {
            findings,
            scored,
            skipped,
        })
    }

    /// Scores every element without applying a threshold. Always fail-fast:
    /// callers that want all scores get all scores or a precise error.
    pub fn score_elements(&self, sql: &str) -> Result<Vec<SimilarityResult>, AnalyzeError> {
        let elements = extract(sql, self.dialect)?;
        elements
            .into_iter()
            .map(|element| match self.score_element(&element) {
                Ok(score) => Ok(SimilarityResult { element, score }),
                Err(failure) => Err(AnalyzeError::element(element, failure)),
            })
            .collect()
    }

    fn score_element(&self, element: &SqlElement) -> Result<f32, ElementFailure> {
        let alias_embedding = self.embedder.embed(&element.alias)?;
        let code_embedding = self.embedder.embed(&element.code)?;
        Ok(cosine_score(&alias_embedding, &code_embedding)?)
    }
}

/// Convenience entry point with the default dialect and failure policy.
pub fn analyze(
    sql: &str,
    threshold: f32,
    embedder: &dyn Embedder,
) -> Result<Vec<Finding>, AnalyzeError> {
    Analyzer::new(embedder).analyze(sql, threshold)
}

fn validate_threshold(threshold: f32) -> Result<(), AnalyzeError> {
    // Also rejects NaN, which fails both comparisons.
    if threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(AnalyzeError::InvalidThreshold { value: threshold })
    }
}

fn build_finding(element: SqlElement, score: f32, severity: Severity, threshold: f32) -> Finding {
    let message = format!(
        "Alias '{}' appears to be a poor name for the code it names (similarity {:.3}, threshold {}): {}",
        element.alias,
        score,
        threshold,
        truncate(&element.code, 60)
    );
    Finding {
        alias: element.alias,
        code: element.code,
        element_type: element.kind,
        scope_path: element.scope_path,
        span: element.span,
        score,
        severity,
        message,
        threshold_used: threshold,
    }
}

fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::TokenHashEmbedder;
    use crate::types::ElementKind;
    use std::collections::HashMap;

    /// Test double with canned vectors per exact text; unknown text fails.
    struct StubEmbedder {
        vectors: HashMap<String, Vec<f32>>,
    }

    impl StubEmbedder {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                vectors: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            }
        }
    }

    impl Embedder for StubEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            crate::embedding::ensure_embeddable(text)?;
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| EmbeddingError::InferenceFailed {
                    reason: format!("no stub vector for {text:?}"),
                })
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn invalid_threshold_is_raised_before_parsing() {
        let embedder = TokenHashEmbedder::new(64);
        // Input is not even valid SQL; the threshold check must win.
        for bad in [0.0, -0.5, 1.5, f32::NAN] {
            let err = analyze("NOT SQL AT ALL", bad, &embedder).unwrap_err();
            assert!(
                matches!(err, AnalyzeError::InvalidThreshold { .. }),
                "threshold {bad} should be invalid, got {err:?}"
            );
        }
    }

    #[test]
    fn thresholds_inside_unit_interval_are_accepted() {
        let embedder = TokenHashEmbedder::new(64);
        for ok in [0.001, 0.4, 0.7, 1.0] {
            assert!(analyze("SELECT 1", ok, &embedder).is_ok());
        }
    }

    #[test]
    fn parse_error_aborts_with_no_partial_results() {
        let embedder = TokenHashEmbedder::new(64);
        let err = analyze("SELECT * FROM", 0.7, &embedder).unwrap_err();
        assert!(matches!(err, AnalyzeError::Parse(_)));
    }

    #[test]
    fn dissimilar_stub_vectors_produce_poor_finding() {
        let embedder = StubEmbedder::new(&[
            ("xyz", vec![1.0, 0.0]),
            ("COUNT(*)", vec![0.0, 1.0]),
        ]);
        let findings = analyze("SELECT COUNT(*) AS xyz FROM t", 0.7, &embedder).unwrap();

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.alias, "xyz");
        assert_eq!(finding.element_type, ElementKind::ColumnAlias);
        assert_eq!(finding.severity, Severity::Poor);
        assert_eq!(finding.threshold_used, 0.7);
        assert!(finding.message.contains("xyz"));
        assert!(finding.message.contains("0.000"));
    }

    #[test]
    fn mid_band_score_is_review() {
        // cos([0.6, 0.8], [1, 0]) = 0.6: below threshold, above the poor cutoff.
        let embedder = StubEmbedder::new(&[
            ("half_good", vec![0.6, 0.8]),
            ("COUNT(*)", vec![1.0, 0.0]),
        ]);
        let findings = analyze("SELECT COUNT(*) AS half_good FROM t", 0.7, &embedder).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Review);
    }

    #[test]
    fn well_named_alias_passes() {
        let embedder = StubEmbedder::new(&[
            ("cnt", vec![1.0, 0.0]),
            ("COUNT(*)", vec![1.0, 0.0]),
        ]);
        let findings = analyze("SELECT COUNT(*) AS cnt FROM t", 0.7, &embedder).unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn fail_fast_error_names_the_element() {
        // Alias embeds fine, code has no stub vector.
        let embedder = StubEmbedder::new(&[("xyz", vec![1.0, 0.0])]);
        let err = analyze("SELECT COUNT(*) AS xyz FROM t", 0.7, &embedder).unwrap_err();
        match err {
            AnalyzeError::Element { identity, element, .. } => {
                assert!(identity.contains("xyz"), "identity was {identity}");
                assert!(identity.contains("COLUMN_ALIAS"));
                assert_eq!(element.alias, "xyz");
            }
            other => panic!("expected Element error, got {other:?}"),
        }
    }

    #[test]
    fn skip_policy_records_identity_and_continues() {
        // First element unknown to the stub, second scores fine.
        let embedder = StubEmbedder::new(&[
            ("known", vec![1.0, 0.0]),
            ("SUM(x)", vec![0.0, 1.0]),
        ]);
        let report = Analyzer::new(&embedder)
            .with_policy(FailurePolicy::Skip)
            .analyze_with_report("SELECT COUNT(*) AS mystery, SUM(x) AS known FROM t", 0.7)
            .unwrap();

        assert_eq!(report.scored, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].element.alias, "mystery");
        assert!(!report.skipped[0].reason.is_empty());
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].alias, "known");
    }

    #[test]
    fn findings_preserve_source_order() {
        let embedder = StubEmbedder::new(&[
            ("aaa", vec![1.0, 0.0]),
            ("bbb", vec![1.0, 0.0]),
            ("COUNT(*)", vec![0.0, 1.0]),
            ("SUM(x)", vec![0.0, 1.0]),
        ]);
        let findings = analyze(
            "SELECT COUNT(*) AS aaa, SUM(x) AS bbb FROM t",
            0.7,
            &embedder,
        )
        .unwrap();
        let order: Vec<_> = findings.iter().map(|f| f.alias.as_str()).collect();
        assert_eq!(order, vec!["aaa", "bbb"]);
    }

    #[test]
    fn higher_threshold_flags_at_least_as_many() {
        let embedder = TokenHashEmbedder::new(256);
        let sql = "WITH user_totals AS (SELECT user_id, COUNT(*) AS cnt FROM events GROUP BY user_id) SELECT * FROM user_totals";
        let mut previous = 0;
        for threshold in [0.1, 0.3, 0.5, 0.7, 0.9, 1.0] {
            let count = analyze(sql, threshold, &embedder).unwrap().len();
            assert!(
                count >= previous,
                "threshold {threshold} flagged {count}, fewer than {previous}"
            );
            previous = count;
        }
    }

    #[test]
    fn identical_inputs_produce_identical_findings() {
        let embedder = TokenHashEmbedder::new(256);
        let sql = "WITH xyz AS (SELECT user_id FROM orders) SELECT * FROM xyz";
        let first = analyze(sql, 0.8, &embedder).unwrap();
        let second = analyze(sql, 0.8, &embedder).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn score_elements_returns_every_element() {
        let embedder = TokenHashEmbedder::new(256);
        let sql = "WITH totals AS (SELECT COUNT(*) AS cnt FROM orders) SELECT * FROM totals";
        let results = Analyzer::new(&embedder).score_elements(sql).unwrap();
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!((0.0..=1.0).contains(&result.score));
        }
    }

    #[test]
    fn truncate_is_utf8_safe() {
        let s = format!("{}é tail", "a".repeat(59));
        let cut = truncate(&s, 60);
        assert_eq!(cut.chars().count(), 60);
    }
}
