//! Parse-layer error type.
//!
//! Parsing is the only stage allowed to fail before any element work starts:
//! a statement that the grammar rejects aborts the whole call, and the
//! original parser diagnostic is surfaced verbatim. Everything downstream
//! (embedding, scoring) reports failures through [`crate::analyzer::AnalyzeError`]
//! with the identity of the element that triggered them.

use crate::types::Dialect;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Error encountered while parsing a SQL statement.
///
/// Wraps the diagnostic produced by the external grammar, preserving the
/// position information embedded in its message when present.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// The parser's diagnostic, unmodified.
    pub message: String,
    /// Line/column where the error occurred, if the parser reported one.
    pub position: Option<Position>,
    /// Dialect that was active when parsing failed.
    pub dialect: Option<Dialect>,
}

/// Position information for a parse error (both 1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            dialect: None,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Recovers line/column from the sqlparser message format
    /// ("... at Line: X, Column: Y"). Coupled to that crate's wording;
    /// returns `None` whenever the pattern is absent.
    fn position_from_message(message: &str) -> Option<Position> {
        static POSITION_RE: OnceLock<Regex> = OnceLock::new();
        let re = POSITION_RE.get_or_init(|| {
            Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").expect("Invalid regex pattern")
        });

        re.captures(message).and_then(|caps| {
            let line: usize = caps.get(1)?.as_str().parse().ok()?;
            let column: usize = caps.get(2)?.as_str().parse().ok()?;
            Some(Position { line, column })
        })
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error")?;

        if let Some(dialect) = self.dialect {
            write!(f, " ({dialect:?})")?;
        }

        if let Some(pos) = self.position {
            write!(f, " at line {}, column {}", pos.line, pos.column)?;
        }

        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        let message = err.to_string();
        let position = Self::position_from_message(&message);

        Self {
            message,
            position,
            dialect: None,
        }
    }
}
