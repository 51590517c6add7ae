pub mod analyzer;
pub mod complexity;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod lint;
pub mod parser;
pub mod similarity;
pub mod types;

// Re-export main types and functions
pub use analyzer::{
    analyze, AnalysisReport, AnalyzeError, Analyzer, FailurePolicy, DEFAULT_THRESHOLD,
};
pub use complexity::{complexity, ComplexityOptions, ComplexityReport};
pub use embedding::{Embedder, EmbeddingError, TokenHashEmbedder};
#[cfg(feature = "onnx")]
pub use embedding::OnnxEmbedder;
pub use error::ParseError;
pub use extract::extract;
pub use lint::{lint, lint_aliases};
pub use parser::{parse_statement, parse_statement_with_dialect};
pub use similarity::{cosine_score, SimilarityError};

// Re-export types explicitly
pub use types::{
    Dialect,
    ElementKind,
    Finding,
    Severity,
    SimilarityResult,
    Span,
    SqlElement,
};
