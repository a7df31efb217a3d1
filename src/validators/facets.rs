//! Constraining facets
//!
//! The four facets a [`Restriction`](super::schemas::Restriction) can carry.
//! Each facet checks a trimmed text value and, on failure, returns the
//! message that ends up in a structural issue.

use std::fmt;

use regex::Regex;

use crate::error::{Error, Result};

/// Outcome of a facet check; `Err` carries the issue message
pub type FacetResult = std::result::Result<(), String>;

/// Length in characters, as facets count it
fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Minimum length facet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinLengthFacet {
    /// Minimum length
    pub value: usize,
}

impl MinLengthFacet {
    /// Create a new minimum length facet
    pub fn new(value: usize) -> Self {
        Self { value }
    }

    /// Validate a value against this facet
    pub fn validate(&self, value: &str, type_name: &str) -> FacetResult {
        let len = char_len(value);
        if len < self.value {
            Err(format!(
                "Value too short for type {}: minimum {} characters, found {}",
                type_name, self.value, len
            ))
        } else {
            Ok(())
        }
    }
}

/// Maximum length facet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxLengthFacet {
    /// Maximum length
    pub value: usize,
}

impl MaxLengthFacet {
    /// Create a new maximum length facet
    pub fn new(value: usize) -> Self {
        Self { value }
    }

    /// Validate a value against this facet
    pub fn validate(&self, value: &str, type_name: &str) -> FacetResult {
        let len = char_len(value);
        if len > self.value {
            Err(format!(
                "Value too long for type {}: maximum {} characters, found {}",
                type_name, self.value, len
            ))
        } else {
            Ok(())
        }
    }
}

/// Pattern facet using regular expressions
///
/// XSD patterns are implicitly anchored; the compiled regex wraps the source
/// pattern as `^(?:...)$` so it must match the whole value.
#[derive(Debug, Clone)]
pub struct PatternFacet {
    /// Pattern as written in the schema
    pub pattern: String,
    /// Compiled, anchored regex
    regex: Regex,
}

impl PatternFacet {
    /// Create a new pattern facet
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| Error::Schema(format!("Invalid pattern '{}': {}", pattern, e)))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Whether the whole value matches
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// Validate a value against this pattern
    pub fn validate(&self, value: &str, type_name: &str) -> FacetResult {
        if self.is_match(value) {
            Ok(())
        } else {
            Err(format!(
                "Value \"{}\" does not match the pattern of type {}: {}",
                value, type_name, self.pattern
            ))
        }
    }
}

impl PartialEq for PatternFacet {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for PatternFacet {}

/// Enumeration facet restricts values to a specific set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationFacet {
    /// Allowed values in declaration order
    pub values: Vec<String>,
}

impl EnumerationFacet {
    /// Create a new enumeration facet
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    /// Whether the value is allowed
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// Validate a value against this enumeration
    pub fn validate(&self, value: &str, type_name: &str) -> FacetResult {
        if self.contains(value) {
            Ok(())
        } else {
            Err(format!(
                "Value \"{}\" is not allowed for type {}. Allowed values: {}",
                value, type_name, self
            ))
        }
    }
}

impl fmt::Display for EnumerationFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.values.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_length_facet() {
        let facet = MinLengthFacet::new(3);
        assert!(facet.validate("abc", "T").is_ok());
        assert!(facet.validate("abcd", "T").is_ok());
        let msg = facet.validate("ab", "Max35Text").unwrap_err();
        assert!(msg.contains("Max35Text"));
        assert!(msg.contains("minimum 3"));
    }

    #[test]
    fn test_max_length_counts_characters() {
        let facet = MaxLengthFacet::new(4);
        assert!(facet.validate("Jo\u{E3}o", "T").is_ok());
        let msg = facet.validate("abcde", "T").unwrap_err();
        assert!(msg.contains("found 5"));
    }

    #[test]
    fn test_pattern_facet_is_anchored() {
        let facet = PatternFacet::new("[0-9]{8}").unwrap();
        assert!(facet.validate("12345678", "ISPB").is_ok());
        assert!(facet.validate("123456789", "ISPB").is_err());
        assert!(facet.validate("x12345678", "ISPB").is_err());

        let alternation = PatternFacet::new("AB|CD").unwrap();
        assert!(alternation.is_match("CD"));
        assert!(!alternation.is_match("ABCD"));
    }

    #[test]
    fn test_pattern_message_carries_pattern() {
        let facet = PatternFacet::new("[A-Z]{4}").unwrap();
        let msg = facet.validate("ab", "Code").unwrap_err();
        assert!(msg.contains("[A-Z]{4}"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(PatternFacet::new("[a-"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_enumeration_facet() {
        let facet = EnumerationFacet::new(vec!["ACSC".into(), "RJCT".into()]);
        assert!(facet.validate("ACSC", "T").is_ok());
        let msg = facet.validate("PDNG", "ExternalStatus").unwrap_err();
        assert!(msg.contains("\"PDNG\""));
        assert!(msg.contains("ACSC, RJCT"));
    }
}
