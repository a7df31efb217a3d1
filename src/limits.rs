//! Limits for document processing
//!
//! Interbank messages are small; these bounds keep a hostile or corrupted
//! payload from exhausting memory or the stack during parsing and the
//! recursive structural walk. Exceeding a limit is an [`Error::LimitExceeded`],
//! never a validation issue.

use crate::error::{Error, Result};

/// Bounds applied while parsing a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum element nesting depth
    pub max_xml_depth: usize,

    /// Maximum payload size in bytes
    pub max_xml_size: usize,

    /// Maximum number of attributes on one element
    pub max_attributes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_depth: 256,
            max_xml_size: 16 * 1024 * 1024, // 16 MB
            max_attributes: 256,
        }
    }
}

impl Limits {
    /// Default bounds
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds for gateways that only ever see single messages
    pub fn strict() -> Self {
        Self {
            max_xml_depth: 64,
            max_xml_size: 1024 * 1024, // 1 MB
            max_attributes: 32,
        }
    }

    /// Set the maximum nesting depth
    pub fn with_max_xml_depth(mut self, depth: usize) -> Self {
        self.max_xml_depth = depth;
        self
    }

    /// Set the maximum payload size
    pub fn with_max_xml_size(mut self, size: usize) -> Self {
        self.max_xml_size = size;
        self
    }

    /// Set the maximum attribute count per element
    pub fn with_max_attributes(mut self, count: usize) -> Self {
        self.max_attributes = count;
        self
    }

    /// Nesting depth reached while parsing
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        exceeded("Element depth", depth, self.max_xml_depth)
    }

    /// Payload size in bytes
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        exceeded("Message size (bytes)", size, self.max_xml_size)
    }

    /// Attributes on one element
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        exceeded("Attribute count", count, self.max_attributes)
    }
}

fn exceeded(what: &str, found: usize, max: usize) -> Result<()> {
    if found > max {
        return Err(Error::LimitExceeded(format!(
            "{} {} exceeds maximum {}",
            what, found, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_xml_depth, 256);
        assert!(limits.check_xml_depth(256).is_ok());
        assert!(limits.check_xml_depth(257).is_err());
    }

    #[test]
    fn test_strict_is_tighter() {
        let strict = Limits::strict();
        let default = Limits::default();
        assert!(strict.max_xml_depth < default.max_xml_depth);
        assert!(strict.max_xml_size < default.max_xml_size);
        assert!(strict.max_attributes < default.max_attributes);
    }

    #[test]
    fn test_builders() {
        let limits = Limits::new()
            .with_max_xml_size(64)
            .with_max_xml_depth(4)
            .with_max_attributes(2);
        assert!(limits.check_xml_size(64).is_ok());
        assert!(limits.check_xml_depth(5).is_err());
        assert!(limits.check_attributes(3).is_err());
    }

    #[test]
    fn test_error_message() {
        let err = Limits::new().with_max_xml_size(10).check_xml_size(11).unwrap_err();
        assert!(matches!(err, Error::LimitExceeded(_)));
        assert_eq!(err.to_string(), "limit exceeded: Message size (bytes) 11 exceeds maximum 10");
    }
}
