//! Core value types for alias-quality analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Score below which a flagged alias is classified as `poor` rather than
/// `review`, independent of the caller's threshold.
pub const POOR_CUTOFF: f32 = 0.4;

/// SQL dialect for parsing.
///
/// Grammar support is whatever the external parser provides; this enum only
/// selects which of its dialects drives tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Generic,
    Ansi,
    Bigquery,
    Clickhouse,
    Databricks,
    Duckdb,
    Hive,
    Mssql,
    Mysql,
    Postgres,
    Redshift,
    Snowflake,
    Sqlite,
}

impl Dialect {
    pub fn to_sqlparser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        use sqlparser::dialect::{
            AnsiDialect, BigQueryDialect, ClickHouseDialect, DatabricksDialect, DuckDbDialect,
            GenericDialect, HiveDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
            RedshiftSqlDialect, SQLiteDialect, SnowflakeDialect,
        };
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::Ansi => Box::new(AnsiDialect {}),
            Self::Bigquery => Box::new(BigQueryDialect {}),
            Self::Clickhouse => Box::new(ClickHouseDialect {}),
            Self::Databricks => Box::new(DatabricksDialect {}),
            Self::Duckdb => Box::new(DuckDbDialect {}),
            Self::Hive => Box::new(HiveDialect {}),
            Self::Mssql => Box::new(MsSqlDialect {}),
            Self::Mysql => Box::new(MySqlDialect {}),
            Self::Postgres => Box::new(PostgreSqlDialect {}),
            Self::Redshift => Box::new(RedshiftSqlDialect {}),
            Self::Snowflake => Box::new(SnowflakeDialect {}),
            Self::Sqlite => Box::new(SQLiteDialect {}),
        }
    }
}

/// What kind of named fragment an element is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementKind {
    Cte,
    TableAlias,
    ColumnAlias,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cte => "CTE",
            Self::TableAlias => "TABLE_ALIAS",
            Self::ColumnAlias => "COLUMN_ALIAS",
        };
        f.write_str(s)
    }
}

/// A byte range in the source SQL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Byte offset from start of SQL string (inclusive)
    pub start: usize,
    /// Byte offset from start of SQL string (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// One named fragment recovered from a statement: a CTE, an aliased table
/// reference, or an aliased projection.
///
/// `alias` is the identifier exactly as written (case preserved). `code` is
/// the defining text of the thing the alias names, sliced verbatim from the
/// input, never a resolved or expanded form. Created once per extraction,
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlElement {
    pub kind: ElementKind,

    pub alias: String,

    pub code: String,

    /// Lexical nesting context: the aliases of the enclosing CTEs/derived
    /// tables, outermost first. Disambiguates duplicate aliases at different
    /// scope levels; not required to be globally unique.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope_path: Vec<String>,

    /// Location of `code` in the source, when the parser reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl SqlElement {
    /// Human-readable identity used in error messages and logs:
    /// kind + alias + scope.
    pub fn identity(&self) -> String {
        if self.scope_path.is_empty() {
            format!("{} '{}'", self.kind, self.alias)
        } else {
            format!(
                "{} '{}' (in {})",
                self.kind,
                self.alias,
                self.scope_path.join(" > ")
            )
        }
    }
}

/// Output of scoring one element against its alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityResult {
    pub element: SqlElement,
    /// Cosine similarity clamped to [0, 1]. Deterministic for identical
    /// (alias, code) text and a fixed embedding model.
    pub score: f32,
}

/// How badly a flagged alias mismatches its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Poor,
    Review,
}

impl Severity {
    /// Classifies a score against the caller's threshold.
    ///
    /// `None` means the element passed (score >= threshold, no finding).
    /// Below the threshold, scores under [`POOR_CUTOFF`] are `Poor` and the
    /// rest are `Review`.
    pub fn classify(score: f32, threshold: f32) -> Option<Self> {
        if score >= threshold {
            None
        } else if score < POOR_CUTOFF {
            Some(Self::Poor)
        } else {
            Some(Self::Review)
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poor => f.write_str("poor"),
            Self::Review => f.write_str("review"),
        }
    }
}

/// A flagged alias: a similarity result that fell below the caller's
/// threshold, annotated with a verdict.
///
/// Immutable value object; carries the threshold that produced it so the
/// verdict is replayable without ambient configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub alias: String,

    pub code: String,

    pub element_type: ElementKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope_path: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,

    pub score: f32,

    pub severity: Severity,

    pub message: String,

    /// The cutoff this verdict was computed against.
    pub threshold_used: f32,
}
