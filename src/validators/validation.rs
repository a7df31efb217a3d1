//! Validation infrastructure
//!
//! The context that accumulates issues while a document is walked, and the
//! `{ok, issues}` report the structural and business checks return.

use serde::Serialize;

use crate::documents::{Document, NodeId};
use crate::error::{TextPos, ValidationIssue};

/// Outcome of a check that only accumulates issues
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// True when no issue was recorded
    pub ok: bool,
    /// Recorded issues in discovery order
    pub issues: Vec<ValidationIssue>,
}

impl CheckReport {
    /// Build a report from issues
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            ok: issues.is_empty(),
            issues,
        }
    }

    /// Report with a single issue
    pub fn failed(issue: ValidationIssue) -> Self {
        Self::from_issues(vec![issue])
    }
}

/// Location of the element currently being checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// XPath-like path
    pub path: String,
    /// Position of the element's start tag
    pub pos: Option<TextPos>,
}

impl Cursor {
    /// Cursor on a document node
    pub fn at(doc: &Document, node: NodeId) -> Self {
        Self {
            path: doc.path_of(node),
            pos: doc.position(node),
        }
    }

    /// Path of a child of this element
    pub fn child_path(&self, name: &str) -> String {
        format!("{}/{}", self.path, name)
    }
}

/// Validation context for the structural walk
#[derive(Debug, Default)]
pub struct ValidationContext {
    /// Collected issues
    pub issues: Vec<ValidationIssue>,
}

impl ValidationContext {
    /// Create a new validation context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a structural issue
    pub fn report(&mut self, message: impl Into<String>, path: impl Into<String>, pos: Option<TextPos>) {
        self.issues
            .push(ValidationIssue::structural(message).with_path(path).at(pos));
    }

    /// Whether any issue was recorded
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Finish into a report
    pub fn into_report(self) -> CheckReport {
        CheckReport::from_issues(self.issues)
    }
}
