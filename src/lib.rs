//! # spi-xml
//!
//! Schema and XML digital-signature engine for SPI instant-payment ISO 20022
//! messages (`pacs.002`, `pacs.004`, `pacs.008`).
//!
//! ## Features
//!
//! - Input sanitizing before parsing
//! - Family/version detection from the envelope namespace and `MsgDefIdr`
//! - A small schema engine: simple-type restrictions, ordered sequences and
//!   occurrence bounds, with cached per-version models
//! - Enveloped three-reference XML-DSig signing and verification
//! - Business rules per message family
//! - One aggregate, JSON-serializable validation result
//!
//! ## Example
//!
//! ```rust,ignore
//! use spi_xml::{validate_all, ValidationOptions};
//!
//! let result = validate_all(&xml, &ValidationOptions::default()).await?;
//! if !result.valid {
//!     for issue in result.issues() {
//!         eprintln!("{}", issue);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;
pub mod namespaces;

// Documents and resources
pub mod config;
pub mod documents;
pub mod loaders;

// Input handling
pub mod detection;
pub mod preprocess;

// Validators
pub mod dsig;
pub mod rules;
pub mod validators;

// Composition
pub mod orchestrator;

// Re-exports for convenience
pub use config::EngineConfig;
pub use detection::{detect, Detection, MessageFamily, SchemaKey};
pub use documents::Document;
pub use dsig::{
    validate_signature, CertificateResolver, FnResolver, ResolverError, SignatureReport,
    StaticCertificateResolver, XmlSigner,
};
pub use error::{Error, IssueCategory, Result, ValidationIssue};
pub use limits::Limits;
pub use orchestrator::{validate_all, Engine, ValidationOptions, ValidationResult};
pub use validators::{CheckReport, SchemaModel, SchemaRegistry};

/// Version of the spi-xml library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
