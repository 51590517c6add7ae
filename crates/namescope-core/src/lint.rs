//! Convenience facade over the two analyses.
//!
//! `lint_aliases` returns the similarity score of every named element, not
//! just the flagged ones; `lint` runs the full complexity report. Both take
//! the embedding provider from the caller.

use crate::analyzer::{AnalyzeError, Analyzer};
use crate::complexity::{complexity, ComplexityOptions, ComplexityReport};
use crate::embedding::Embedder;
use crate::types::SimilarityResult;

/// Scores every aliased element in the statement.
pub fn lint_aliases(
    sql: &str,
    embedder: &dyn Embedder,
) -> Result<Vec<SimilarityResult>, AnalyzeError> {
    Analyzer::new(embedder).score_elements(sql)
}

/// Runs the structural+semantic complexity report with the given options.
pub fn lint(
    sql: &str,
    embedder: &dyn Embedder,
    options: ComplexityOptions,
) -> Result<ComplexityReport, AnalyzeError> {
    complexity(sql, embedder, options)
}
