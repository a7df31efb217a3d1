//! Validation orchestration
//!
//! Runs preprocessing, then the structural, signature and business checks
//! the caller enabled, and folds them into one [`ValidationResult`]. Checks
//! are independent: they share only the read-only schema cache.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::detection::{detect_document, detect_text, Detection};
use crate::documents::Document;
use crate::dsig::{validate_document_signature, CertificateResolver, SignatureDescriptor, SignatureReport};
use crate::error::{Error, IssueCategory, ParseError, Result, ValidationIssue};
use crate::limits::Limits;
use crate::preprocess;
use crate::rules::validate_business;
use crate::validators::{validate_document, CheckReport, SchemaRegistry};

/// Which checks to run
#[derive(Clone)]
pub struct ValidationOptions {
    /// Run the structural (schema) check
    pub structural: bool,
    /// Run the signature check
    pub signature: bool,
    /// Run the business rules
    pub business: bool,
    /// Sanitize the input before parsing
    pub preprocess: bool,
    /// Resolver enabling cryptographic signature verification
    pub certificate_resolver: Option<Arc<dyn CertificateResolver>>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            structural: true,
            signature: true,
            business: true,
            preprocess: true,
            certificate_resolver: None,
        }
    }
}

impl fmt::Debug for ValidationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationOptions")
            .field("structural", &self.structural)
            .field("signature", &self.signature)
            .field("business", &self.business)
            .field("preprocess", &self.preprocess)
            .field("certificate_resolver", &self.certificate_resolver.is_some())
            .finish()
    }
}

impl ValidationOptions {
    /// Every check enabled, no resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the structural check
    pub fn with_structural(mut self, enabled: bool) -> Self {
        self.structural = enabled;
        self
    }

    /// Enable or disable the signature check
    pub fn with_signature(mut self, enabled: bool) -> Self {
        self.signature = enabled;
        self
    }

    /// Enable or disable the business rules
    pub fn with_business(mut self, enabled: bool) -> Self {
        self.business = enabled;
        self
    }

    /// Enable or disable preprocessing
    pub fn with_preprocess(mut self, enabled: bool) -> Self {
        self.preprocess = enabled;
        self
    }

    /// Verify signatures cryptographically with certificates from `resolver`
    pub fn with_certificate_resolver(mut self, resolver: Arc<dyn CertificateResolver>) -> Self {
        self.certificate_resolver = Some(resolver);
        self
    }
}

/// Aggregate outcome; disabled checks are `None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// AND of every enabled check
    pub valid: bool,
    /// Detected family and version
    pub detected: Detection,
    /// Structural check
    pub structural: Option<CheckReport>,
    /// Signature check
    pub signature: Option<SignatureReport>,
    /// Business rules
    pub business: Option<CheckReport>,
}

impl ValidationResult {
    /// Every issue of every enabled check
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        let structural = self.structural.iter().flat_map(|r| r.issues.iter());
        let signature = self.signature.iter().flat_map(|r| r.issues.iter());
        let business = self.business.iter().flat_map(|r| r.issues.iter());
        structural.chain(signature).chain(business)
    }

    fn compute_valid(&mut self) {
        self.valid = self.structural.as_ref().map_or(true, |r| r.ok)
            && self.signature.as_ref().map_or(true, |r| r.ok)
            && self.business.as_ref().map_or(true, |r| r.ok);
    }
}

/// Validation engine bound to one schema registry
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<SchemaRegistry>,
    limits: Limits,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine over the process-wide registry
    pub fn new() -> Self {
        Self {
            registry: SchemaRegistry::global(),
            limits: Limits::default(),
        }
    }

    /// Engine with its own registry built from `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            registry: Arc::new(SchemaRegistry::from_config(config)),
            limits: config.limits.clone(),
        }
    }

    /// Engine sharing an existing registry
    pub fn with_registry(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            limits: Limits::default(),
        }
    }

    /// Use other document limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// The schema registry
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Validate raw bytes; invalid UTF-8 is replaced before preprocessing
    pub async fn validate_bytes(&self, input: &[u8], options: &ValidationOptions) -> Result<ValidationResult> {
        let text = if options.preprocess {
            preprocess::sanitize_bytes(input)
        } else {
            String::from_utf8_lossy(input).into_owned()
        };
        let options = ValidationOptions {
            preprocess: false,
            ..options.clone()
        };
        self.validate(&text, &options).await
    }

    /// Validate document text
    ///
    /// Fails only when a schema resource exists but cannot be read or used,
    /// or when the document exceeds the configured limits.
    pub async fn validate(&self, xml: &str, options: &ValidationOptions) -> Result<ValidationResult> {
        let sanitized;
        let text = if options.preprocess {
            sanitized = preprocess::sanitize(xml);
            sanitized.as_str()
        } else {
            xml
        };

        let doc = match Document::parse_with_limits(text, &self.limits) {
            Ok(doc) => doc,
            Err(Error::MalformedInput(e)) => {
                debug!(error = %e, "validation of malformed input");
                let detected = detect_text(text, self.registry.schema_dir());
                return Ok(malformed_result(&e, detected, options));
            }
            Err(e) => return Err(e),
        };

        let detected = detect_document(&doc, self.registry.schema_dir());
        let mut result = ValidationResult {
            valid: false,
            structural: None,
            signature: None,
            business: None,
            detected,
        };

        if options.structural {
            result.structural = Some(self.validate_structure(&doc, &result.detected)?);
        }
        if options.signature {
            let resolver = options.certificate_resolver.as_deref();
            result.signature = Some(validate_document_signature(&doc, resolver).await);
        }
        if options.business {
            result.business = Some(validate_business(text, result.detected.message_family()));
        }

        result.compute_valid();
        debug!(
            valid = result.valid,
            family = ?result.detected.family,
            version = ?result.detected.version,
            "validation finished"
        );
        Ok(result)
    }

    /// Structural check of a parsed document against its detected schema
    pub fn validate_structure(&self, doc: &Document, detected: &Detection) -> Result<CheckReport> {
        let Some(key) = detected.key() else {
            return Ok(CheckReport::failed(ValidationIssue::structural(
                "Could not detect SPI message family/version",
            )));
        };
        if detected.xsd_file.is_none() && self.registry.cached(&key).is_none() {
            let path = key.resource_path(self.registry.schema_dir());
            return Ok(CheckReport::failed(ValidationIssue::structural(format!(
                "No schema available for {} (expected at {})",
                key,
                path.display()
            ))));
        }
        match self.registry.get_or_load(&key) {
            Ok(schema) => Ok(validate_document(doc, &schema)),
            Err(Error::SchemaNotFound { key, path }) => Ok(CheckReport::failed(ValidationIssue::structural(
                format!("No schema available for {} (expected at {})", key, path),
            ))),
            Err(e) => Err(e),
        }
    }
}

fn malformed_issue(category: IssueCategory, error: &ParseError) -> ValidationIssue {
    let mut issue = ValidationIssue::new(category, format!("Malformed XML: {}", error.message));
    issue.line = error.line;
    issue.column = error.column;
    issue
}

fn malformed_result(error: &ParseError, detected: Detection, options: &ValidationOptions) -> ValidationResult {
    let report = |category| CheckReport::failed(malformed_issue(category, error));
    let mut result = ValidationResult {
        valid: false,
        detected,
        structural: options.structural.then(|| report(IssueCategory::Structural)),
        signature: options.signature.then(|| SignatureReport {
            ok: false,
            issues: vec![malformed_issue(IssueCategory::Signature, error)],
            details: SignatureDescriptor::default(),
        }),
        business: options.business.then(|| report(IssueCategory::Business)),
    };
    result.compute_valid();
    result
}

/// Validate with the process-wide engine
pub async fn validate_all(xml: &str, options: &ValidationOptions) -> Result<ValidationResult> {
    Engine::new().validate(xml, options).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_checks_are_null() {
        let options = ValidationOptions::new()
            .with_signature(false)
            .with_business(false)
            .with_structural(false);
        let result = validate_all("<Envelope/>", &options).await.unwrap();
        assert!(result.valid);
        assert!(result.structural.is_none() && result.signature.is_none() && result.business.is_none());

        let json = serde_json::to_value(&result).unwrap();
        assert!(json["structural"].is_null());
        assert!(json["detected"]["xsdFile"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_input_fails_every_enabled_check() {
        let options = ValidationOptions::new().with_business(false);
        let result = validate_all("<Envelope><AppHdr></Envelope>", &options).await.unwrap();
        assert!(!result.valid);
        assert!(result.business.is_none());

        let structural = result.structural.unwrap();
        assert!(structural.issues[0].message.starts_with("Malformed XML"));
        assert_eq!(structural.issues[0].category, IssueCategory::Structural);
        let signature = result.signature.unwrap();
        assert_eq!(signature.issues[0].category, IssueCategory::Signature);
    }

    #[tokio::test]
    async fn test_malformed_input_still_reports_detection() {
        let options = ValidationOptions::new().with_signature(false).with_business(false);
        let xml = r#"<Envelope xmlns="https://www.bcb.gov.br/pi/pacs.004/1.5"><AppHdr><MsgDefIdr>pacs.004.spi.1.5</MsgDefIdr></Envelope>"#;
        let result = validate_all(xml, &options).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.detected.family.as_deref(), Some("pacs.004"));
        assert_eq!(result.detected.version.as_deref(), Some("1.5"));
        assert_eq!(result.detected.header_identifier.as_deref(), Some("pacs.004.spi.1.5"));
        assert!(result.structural.unwrap().issues[0].message.starts_with("Malformed XML"));
    }

    #[tokio::test]
    async fn test_undetected_family_is_structural_issue() {
        let options = ValidationOptions::new().with_signature(false);
        let result = validate_all(r#"<Envelope xmlns="urn:other"/>"#, &options).await.unwrap();
        assert!(!result.valid);
        assert_eq!(
            result.structural.unwrap().issues[0].message,
            "Could not detect SPI message family/version"
        );
        assert!(result.business.unwrap().ok);
    }

    #[tokio::test]
    async fn test_missing_schema_version() {
        let options = ValidationOptions::new().with_signature(false).with_business(false);
        let xml = r#"<Envelope xmlns="https://www.bcb.gov.br/pi/pacs.002/9.99"/>"#;
        let result = validate_all(xml, &options).await.unwrap();
        let structural = result.structural.unwrap();
        assert_eq!(structural.issues.len(), 1);
        assert!(structural.issues[0].message.starts_with("No schema available for pacs.002 9.99"));
    }

    #[test]
    fn test_options_debug_hides_resolver() {
        let text = format!("{:?}", ValidationOptions::default());
        assert!(text.contains("certificate_resolver: false"));
    }
}
