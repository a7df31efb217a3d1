//! Message family and version detection
//!
//! The family/version pair comes from two places: the envelope namespace
//! (`https://www.bcb.gov.br/pi/pacs.002/1.14`) and the header identifier
//! (`pacs.002.spi.1.14`). The header wins when both carry a version.

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::documents::Document;
use crate::limits::Limits;
use crate::namespaces::SPI_NAMESPACE_BASE;

static NAMESPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)pi/([a-z]+\.\d{3})/([\d.]+)").expect("static namespace regex is valid")
});

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)*$").expect("static version regex is valid"));

static XMLNS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"xmlns(?::[\w.-]+)?\s*=\s*["']([^"']*)["']"#).expect("static xmlns regex is valid")
});

static HEADER_IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:[\w.-]+:)?MsgDefIdr\s*>([^<]*)<").expect("static header regex is valid")
});

/// Local name of the header identifier element
const HEADER_IDENTIFIER: &str = "MsgDefIdr";

/// Separator between family and version in a header identifier
const SPI_SEPARATOR: &str = ".spi.";

/// Cache key of a schema model: message family plus version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaKey {
    /// Family, e.g. `pacs.002`
    pub family: String,
    /// Version, e.g. `1.14`
    pub version: String,
}

impl SchemaKey {
    /// Create a new key
    pub fn new(family: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            version: version.into(),
        }
    }

    /// File name of the schema resource (`pacs.002.spi.1.14.xsd`)
    pub fn file_name(&self) -> String {
        format!("{}{}{}.xsd", self.family, SPI_SEPARATOR, self.version)
    }

    /// Deterministic resource path under `schema_dir`
    ///
    /// `<schema_dir>/pacs002/pacs.002.spi.1.14.xsd`
    pub fn resource_path(&self, schema_dir: &Path) -> PathBuf {
        schema_dir
            .join(self.family.replace('.', ""))
            .join(self.file_name())
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.family, self.version)
    }
}

/// Message families served by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageFamily {
    /// FIToFIPaymentStatusReport
    Pacs002,
    /// PaymentReturn
    Pacs004,
    /// FIToFICustomerCreditTransfer
    Pacs008,
}

impl MessageFamily {
    /// All known families
    pub const ALL: [MessageFamily; 3] = [
        MessageFamily::Pacs002,
        MessageFamily::Pacs004,
        MessageFamily::Pacs008,
    ];

    /// Parse a family name (`pacs.002`)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(name))
    }

    /// Family name
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFamily::Pacs002 => "pacs.002",
            MessageFamily::Pacs004 => "pacs.004",
            MessageFamily::Pacs008 => "pacs.008",
        }
    }

    /// Version of the bundled schema
    pub fn current_version(&self) -> &'static str {
        match self {
            MessageFamily::Pacs002 => "1.14",
            MessageFamily::Pacs004 => "1.5",
            MessageFamily::Pacs008 => "1.13",
        }
    }

    /// Header identifier expected in `MsgDefIdr`
    pub fn header_identifier(&self) -> String {
        format!("{}{}{}", self.as_str(), SPI_SEPARATOR, self.current_version())
    }

    /// Envelope namespace of the bundled schema version
    pub fn namespace(&self) -> String {
        format!(
            "{}{}/{}",
            SPI_NAMESPACE_BASE,
            self.as_str(),
            self.current_version()
        )
    }

    /// Schema key of the bundled version
    pub fn schema_key(&self) -> SchemaKey {
        SchemaKey::new(self.as_str(), self.current_version())
    }
}

impl fmt::Display for MessageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of detection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Message family, when recognized
    pub family: Option<String>,
    /// Schema version, when recognized
    pub version: Option<String>,
    /// Root element namespace (empty when absent)
    pub namespace: String,
    /// Trimmed `MsgDefIdr` text
    pub header_identifier: Option<String>,
    /// Resource path, when the schema exists
    pub xsd_file: Option<String>,
}

impl Detection {
    /// Family/version pair, when both were detected
    pub fn key(&self) -> Option<SchemaKey> {
        match (&self.family, &self.version) {
            (Some(family), Some(version)) => Some(SchemaKey::new(family, version)),
            _ => None,
        }
    }

    /// Known family, when recognized
    pub fn message_family(&self) -> Option<MessageFamily> {
        self.family.as_deref().and_then(MessageFamily::from_name)
    }
}

/// Detect family and version of raw document text
///
/// Never fails: text that does not parse is scanned for the envelope
/// namespace and header identifier instead.
pub fn detect(xml: &str, schema_dir: &Path) -> Detection {
    match Document::parse_with_limits(xml, &Limits::default()) {
        Ok(doc) => detect_document(&doc, schema_dir),
        Err(e) => {
            debug!(error = %e, "detection on unparsable input");
            detect_text(xml, schema_dir)
        }
    }
}

/// Best-effort detection over raw text that is not well-formed
///
/// Takes the first declared namespace that looks like an SPI envelope
/// namespace, or the first declaration at all.
pub fn detect_text(xml: &str, schema_dir: &Path) -> Detection {
    let declared: Vec<&str> = XMLNS_RE
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    let namespace = declared
        .iter()
        .find(|ns| NAMESPACE_RE.is_match(ns))
        .or_else(|| declared.first())
        .map(|ns| ns.to_string())
        .unwrap_or_default();

    let header_identifier = HEADER_IDENTIFIER_RE
        .captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    build_detection(namespace, header_identifier, schema_dir)
}

/// Detect family and version of a parsed document
pub fn detect_document(doc: &Document, schema_dir: &Path) -> Detection {
    let Some(root) = doc.root() else {
        return Detection::default();
    };

    let namespace = doc.namespace(root).unwrap_or("").to_string();
    let header_identifier = std::iter::once(root)
        .chain(doc.descendants(root))
        .find(|&n| doc.local_name(n) == HEADER_IDENTIFIER)
        .map(|n| doc.text_content(n).trim().to_string())
        .filter(|s| !s.is_empty());

    build_detection(namespace, header_identifier, schema_dir)
}

fn build_detection(namespace: String, header_identifier: Option<String>, schema_dir: &Path) -> Detection {
    let (ns_family, ns_version) = match NAMESPACE_RE.captures(&namespace) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str().to_ascii_lowercase()),
            caps.get(2).map(|m| m.as_str().to_string()),
        ),
        None => (None, None),
    };

    let header_version = header_identifier
        .as_deref()
        .and_then(|id| id.split(SPI_SEPARATOR).nth(1))
        .filter(|v| VERSION_RE.is_match(v))
        .map(str::to_string);

    let family = ns_family;
    let version = header_version.or(ns_version);

    let xsd_file = match (&family, &version) {
        (Some(family), Some(version)) => {
            let path = SchemaKey::new(family, version).resource_path(schema_dir);
            path.is_file().then(|| path.display().to_string())
        }
        _ => None,
    };

    debug!(
        family = family.as_deref().unwrap_or("-"),
        version = version.as_deref().unwrap_or("-"),
        found = xsd_file.is_some(),
        "message detected"
    );

    Detection {
        family,
        version,
        namespace,
        header_identifier,
        xsd_file,
    }
}
