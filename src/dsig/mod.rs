//! XML digital signatures
//!
//! The clearing system mandates one signature layout: an enveloped
//! `Signature` inside `AppHdr/Sgntr` with exactly three references (key
//! info, header, body), exclusive canonicalization, RSA-SHA256 and SHA-256
//! digests. [`sign`] produces that layout and [`verify`] checks it; both
//! share the constants and anchor lookups defined here.

pub mod c14n;
pub mod certs;
pub mod resolver;
pub mod sign;
pub mod verify;

use serde::Serialize;

use crate::documents::{Document, NodeId};
use crate::namespaces::DSIG_NAMESPACE;

pub use resolver::{CertificateResolver, FnResolver, ResolverError, StaticCertificateResolver};
pub use sign::XmlSigner;
pub use verify::{
    validate_document_signature, validate_signature, ReferenceDescriptor, SignatureDescriptor, SignatureReport,
};

/// Exclusive XML canonicalization 1.0 (without comments)
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// RSASSA-PKCS1-v1_5 with SHA-256
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

/// SHA-256 digest
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// Enveloped-signature transform
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Id assigned to the header element
pub const HEADER_ID: &str = "_0";

/// Id assigned to the body element
pub const BODY_ID: &str = "document-id";

/// Default Id of the `KeyInfo` element
pub const DEFAULT_KEY_INFO_ID: &str = "key-info-id";

/// Header element local name
pub const HEADER_ELEMENT: &str = "AppHdr";

/// Body element local name
pub const BODY_ELEMENT: &str = "Document";

/// Signature container inside the header
pub const SIGNATURE_CONTAINER: &str = "Sgntr";

/// Human-readable signature location
pub const SIGNATURE_LOCATION: &str = "AppHdr.Sgntr";

/// XML-DSig element names skipped by the structural walk
pub const DSIG_ELEMENT_NAMES: [&str; 16] = [
    "KeyInfo",
    "Signature",
    "SignedInfo",
    "CanonicalizationMethod",
    "SignatureMethod",
    "Reference",
    "Transforms",
    "Transform",
    "DigestMethod",
    "DigestValue",
    "SignatureValue",
    "X509Data",
    "X509Certificate",
    "X509IssuerSerial",
    "X509IssuerName",
    "X509SerialNumber",
];

/// Whether an element belongs to the signature vocabulary
pub fn is_signature_element(doc: &Document, node: NodeId) -> bool {
    doc.namespace(node) == Some(DSIG_NAMESPACE) || DSIG_ELEMENT_NAMES.contains(&doc.local_name(node))
}

/// Role of a reference, derived from its shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceRole {
    /// `URI="#<id>"` pointing at `KeyInfo`
    KeyInfo,
    /// Enveloped reference over the header
    Header,
    /// Reference over the body
    Body,
}

impl ReferenceRole {
    /// All roles in signing order
    pub const ALL: [ReferenceRole; 3] = [ReferenceRole::KeyInfo, ReferenceRole::Header, ReferenceRole::Body];

    /// Classify a reference by its URI and transforms
    pub fn classify(uri: Option<&str>, transforms: &[String]) -> Self {
        if uri.is_some_and(|u| u.starts_with('#')) {
            ReferenceRole::KeyInfo
        } else if transforms.iter().any(|t| t == ENVELOPED_SIGNATURE) {
            ReferenceRole::Header
        } else {
            ReferenceRole::Body
        }
    }

    /// Transforms the role requires, in order
    pub fn required_transforms(&self) -> &'static [&'static str] {
        match self {
            ReferenceRole::Header => &[ENVELOPED_SIGNATURE, EXC_C14N],
            ReferenceRole::KeyInfo | ReferenceRole::Body => &[EXC_C14N],
        }
    }

    /// Name used in messages
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceRole::KeyInfo => "KeyInfo",
            ReferenceRole::Header => HEADER_ELEMENT,
            ReferenceRole::Body => BODY_ELEMENT,
        }
    }
}

/// First DSig-namespace descendant (or self) with the given local name
pub(crate) fn find_dsig(doc: &Document, node: NodeId, local_name: &str) -> Option<NodeId> {
    std::iter::once(node)
        .chain(doc.descendants(node))
        .find(|&n| doc.local_name(n) == local_name && doc.namespace(n) == Some(DSIG_NAMESPACE))
}

/// All DSig-namespace descendants with the given local name
pub(crate) fn find_all_dsig(doc: &Document, node: NodeId, local_name: &str) -> Vec<NodeId> {
    doc.descendants(node)
        .into_iter()
        .filter(|&n| doc.local_name(n) == local_name && doc.namespace(n) == Some(DSIG_NAMESPACE))
        .collect()
}

/// Header element enclosing a signature placed in `AppHdr/Sgntr`
///
/// Walks up from the signature; a `Sgntr` must be crossed before `AppHdr`
/// is reached.
pub(crate) fn enclosing_header(doc: &Document, signature: NodeId) -> Option<NodeId> {
    let mut in_container = false;
    for ancestor in doc.ancestors(signature) {
        match doc.local_name(ancestor) {
            SIGNATURE_CONTAINER => in_container = true,
            HEADER_ELEMENT => return in_container.then_some(ancestor),
            _ => {}
        }
    }
    None
}

/// Body element next to a header
pub(crate) fn sibling_body(doc: &Document, header: NodeId) -> Option<NodeId> {
    let parent = doc.parent(header)?;
    doc.child_by_name(parent, BODY_ELEMENT)
}
