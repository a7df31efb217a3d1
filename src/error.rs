//! Error types for spi-xml
//!
//! Hard failures (`Error`) are reserved for infrastructure problems: a
//! document that is not well-formed, a schema resource that cannot be found
//! or read, an unusable signing credential. Validation findings are never
//! errors; they are accumulated as [`ValidationIssue`] values.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::detection::SchemaKey;

/// Result type alias using the spi-xml Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for spi-xml operations
#[derive(Error, Debug)]
pub enum Error {
    /// Input is not well-formed XML
    #[error("malformed input: {0}")]
    MalformedInput(#[from] ParseError),

    /// No schema resource exists for a family/version pair
    #[error("schema not found for {key}: {path}")]
    SchemaNotFound {
        /// Family/version that was requested
        key: SchemaKey,
        /// Deterministic path that was probed
        path: String,
    },

    /// A schema resource exists but could not be read
    #[error("resource error: {0}")]
    Resource(String),

    /// A schema resource was read but cannot be turned into a model
    #[error("schema error: {0}")]
    Schema(String),

    /// Signature generation failed
    #[error("signing error: {0}")]
    Signing(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Well-formedness error with an optional source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// 1-based line of the offending construct
    pub line: Option<usize>,
    /// 1-based column of the offending construct
    pub column: Option<usize>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Set the position
    pub fn at(mut self, pos: TextPos) -> Self {
        self.line = Some(pos.line);
        self.column = Some(pos.column);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, " (line {}, column {})", line, column)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// 1-based line/column position in a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TextPos {
    /// Line number
    pub line: usize,
    /// Column number (in characters)
    pub column: usize,
}

impl TextPos {
    /// Create a new position
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Which sub-validator produced an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    /// Schema order/occurrence/type/unexpected-element findings
    Structural,
    /// XML-DSig structure and cryptographic findings
    Signature,
    /// Business-rule collaborator findings
    Business,
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueCategory::Structural => write!(f, "structural"),
            IssueCategory::Signature => write!(f, "signature"),
            IssueCategory::Business => write!(f, "business"),
        }
    }
}

/// A single accumulated validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Human-readable message
    pub message: String,
    /// Source line, when known
    pub line: Option<usize>,
    /// Source column, when known
    pub column: Option<usize>,
    /// XPath-like location of the offending element
    pub path: Option<String>,
    /// Producing sub-validator
    pub category: IssueCategory,
}

impl ValidationIssue {
    /// Create a new issue without location information
    pub fn new(category: IssueCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
            path: None,
            category,
        }
    }

    /// Shorthand for a structural issue
    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(IssueCategory::Structural, message)
    }

    /// Shorthand for a signature issue
    pub fn signature(message: impl Into<String>) -> Self {
        Self::new(IssueCategory::Signature, message)
    }

    /// Shorthand for a business-rule issue
    pub fn business(message: impl Into<String>) -> Self {
        Self::new(IssueCategory::Business, message)
    }

    /// Set the path where validation failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the source position, if any
    pub fn at(mut self, pos: Option<TextPos>) -> Self {
        if let Some(pos) = pos {
            self.line = Some(pos.line);
            self.column = Some(pos.column);
        }
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)?;

        if let Some(ref path) = self.path {
            write!(f, " at {}", path)?;
        }

        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, " (line {}, column {})", line, column)?;
        }

        Ok(())
    }
}
