//! Signature validation
//!
//! Structural checks (location, algorithms, the three references and their
//! transforms, issuer/serial) always run. Cryptographic verification runs
//! only when a resolver is supplied, the reference structure is intact and
//! the resolver returns a certificate.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, warn};

use super::c14n::{canonicalize, canonicalize_excluding, digest_base64};
use super::certs::{parse_certificate, public_key};
use super::resolver::CertificateResolver;
use super::{
    enclosing_header, find_all_dsig, find_dsig, sibling_body, ReferenceRole, ENVELOPED_SIGNATURE,
    EXC_C14N, RSA_SHA256, SHA256, SIGNATURE_LOCATION,
};
use crate::documents::{Document, NodeId};
use crate::error::ValidationIssue;
use crate::limits::Limits;
use crate::namespaces::DSIG_NAMESPACE;

/// Number of references the signature layout requires
pub const REQUIRED_REFERENCES: usize = 3;

/// Declared algorithms
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Algorithms {
    /// `CanonicalizationMethod/@Algorithm`
    pub canonicalization: Option<String>,
    /// `SignatureMethod/@Algorithm`
    pub signature: Option<String>,
}

/// One reference as found in `SignedInfo`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDescriptor {
    /// Whether a reference with this role was found
    pub present: bool,
    /// `URI` attribute, if any
    pub uri: Option<String>,
    /// Transform algorithms in order
    pub transforms: Vec<String>,
    /// `DigestMethod/@Algorithm`
    pub digest_algorithm: Option<String>,
    /// Structural validity of the reference
    pub valid: bool,
}

/// References by role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSet {
    /// Key-info reference
    pub key_info: ReferenceDescriptor,
    /// Header reference
    pub header: ReferenceDescriptor,
    /// Body reference
    pub body: ReferenceDescriptor,
}

impl ReferenceSet {
    fn slot(&mut self, role: ReferenceRole) -> &mut ReferenceDescriptor {
        match role {
            ReferenceRole::KeyInfo => &mut self.key_info,
            ReferenceRole::Header => &mut self.header,
            ReferenceRole::Body => &mut self.body,
        }
    }
}

/// `X509IssuerSerial` content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSerial {
    /// Whether the element exists
    pub present: bool,
    /// `X509IssuerName` text
    #[serde(rename = "issuerDN")]
    pub issuer_dn: Option<String>,
    /// `X509SerialNumber` text
    pub serial_number: Option<String>,
}

/// Key-info details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfoDescriptor {
    /// Issuer/serial pair
    pub x509_issuer_serial: IssuerSerial,
}

/// Everything the validator learned about the signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureDescriptor {
    /// A signature was found at the mandated location
    pub signature_present: bool,
    /// Number of `Signature` elements anywhere in the document
    pub signature_count: usize,
    /// Mandated location
    pub location: String,
    /// Declared algorithms
    pub algorithms: Algorithms,
    /// References by role
    pub references: ReferenceSet,
    /// Key-info details
    pub key_info: KeyInfoDescriptor,
}

impl Default for SignatureDescriptor {
    fn default() -> Self {
        Self {
            signature_present: false,
            signature_count: 0,
            location: SIGNATURE_LOCATION.to_string(),
            algorithms: Algorithms::default(),
            references: ReferenceSet::default(),
            key_info: KeyInfoDescriptor::default(),
        }
    }
}

/// Outcome of signature validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureReport {
    /// True when no issue was recorded
    pub ok: bool,
    /// Recorded issues
    pub issues: Vec<ValidationIssue>,
    /// Structural details
    pub details: SignatureDescriptor,
}

/// Validate the signature of document text
pub async fn validate_signature(xml: &str, resolver: Option<&dyn CertificateResolver>) -> SignatureReport {
    match Document::parse_with_limits(xml, &Limits::default()) {
        Ok(doc) => validate_document_signature(&doc, resolver).await,
        Err(e) => SignatureReport {
            ok: false,
            issues: vec![ValidationIssue::signature(format!("Malformed XML: {}", e))],
            details: SignatureDescriptor::default(),
        },
    }
}

/// Validate the signature of a parsed document
pub async fn validate_document_signature(
    doc: &Document,
    resolver: Option<&dyn CertificateResolver>,
) -> SignatureReport {
    let mut checker = Checker {
        doc,
        issues: Vec::new(),
        path: None,
    };
    let mut details = SignatureDescriptor::default();

    let Some(root) = doc.root() else {
        checker.issue("Document has no root element");
        return checker.finish(details);
    };

    let signatures: Vec<NodeId> = std::iter::once(root)
        .chain(doc.descendants(root))
        .filter(|&n| doc.local_name(n) == "Signature" && doc.namespace(n) == Some(DSIG_NAMESPACE))
        .collect();
    details.signature_count = signatures.len();

    let located = signatures
        .iter()
        .copied()
        .find_map(|sig| enclosing_header(doc, sig).map(|header| (sig, header)));

    details.key_info.x509_issuer_serial = parse_issuer_serial(doc, located.map(|(sig, _)| sig).unwrap_or(root));

    let Some((signature, header)) = located else {
        checker.issue("Signature not found in <AppHdr><Sgntr>");
        return checker.finish(details);
    };
    details.signature_present = true;
    checker.path = Some(doc.path_of(signature));

    details.algorithms = checker.check_algorithms(signature);

    let signed_info = find_dsig(doc, signature, "SignedInfo");
    let references = signed_info
        .map(|si| find_all_dsig(doc, si, "Reference"))
        .unwrap_or_default();

    let mut parsed = Vec::new();
    if references.len() == REQUIRED_REFERENCES {
        for &reference in &references {
            let (role, descriptor) = checker.check_reference(reference);
            let slot = details.references.slot(role);
            if slot.present {
                checker.issue(format!("Duplicate {} reference", role.label()));
            }
            *slot = descriptor;
            parsed.push((role, reference));
        }
        for role in ReferenceRole::ALL {
            if !details.references.slot(role).present {
                checker.issue(format!("Missing {} reference", role.label()));
            }
        }
    } else {
        checker.issue(format!(
            "SPI requires exactly {} references (KeyInfo, AppHdr, Document); found {}",
            REQUIRED_REFERENCES,
            references.len()
        ));
    }

    let issuer_serial = details.key_info.x509_issuer_serial.clone();
    if !issuer_serial.present {
        checker.issue("KeyInfo lacks X509IssuerSerial (required by SPI)");
    } else if let Some(resolver) = resolver {
        if parsed.len() == REQUIRED_REFERENCES {
            let issuer = issuer_serial.issuer_dn.as_deref().unwrap_or("");
            let serial = issuer_serial.serial_number.as_deref().unwrap_or("");
            match resolver.resolve(issuer, serial).await {
                Ok(Some(pem)) => checker.verify_cryptographically(&pem, signature, header, &parsed),
                Ok(None) => {
                    checker.issue("Could not resolve a certificate for the KeyInfo issuer/serial")
                }
                Err(e) => {
                    warn!(issuer = issuer, serial = serial, error = %e, "certificate resolution failed");
                    checker.issue(format!("Certificate resolution failed: {}", e));
                }
            }
        } else {
            debug!("cryptographic verification skipped: reference structure invalid");
        }
    }

    checker.finish(details)
}

fn parse_issuer_serial(doc: &Document, scope: NodeId) -> IssuerSerial {
    let Some(node) = find_dsig(doc, scope, "X509IssuerSerial") else {
        return IssuerSerial::default();
    };
    let text_of = |name: &str| {
        find_dsig(doc, node, name).map(|n| doc.text_content(n).trim().to_string())
    };
    IssuerSerial {
        present: true,
        issuer_dn: text_of("X509IssuerName"),
        serial_number: text_of("X509SerialNumber"),
    }
}

struct Checker<'a> {
    doc: &'a Document,
    issues: Vec<ValidationIssue>,
    path: Option<String>,
}

impl<'a> Checker<'a> {
    fn issue(&mut self, message: impl Into<String>) {
        let mut issue = ValidationIssue::signature(message);
        if let Some(path) = &self.path {
            issue = issue.with_path(path.clone());
        }
        self.issues.push(issue);
    }

    fn finish(self, details: SignatureDescriptor) -> SignatureReport {
        SignatureReport {
            ok: self.issues.is_empty(),
            issues: self.issues,
            details,
        }
    }

    fn algorithm_of(&self, scope: NodeId, element: &str) -> Option<String> {
        find_dsig(self.doc, scope, element)
            .and_then(|n| self.doc.attribute(n, "Algorithm"))
            .map(str::to_string)
    }

    fn check_algorithms(&mut self, signature: NodeId) -> Algorithms {
        let algorithms = Algorithms {
            canonicalization: self.algorithm_of(signature, "CanonicalizationMethod"),
            signature: self.algorithm_of(signature, "SignatureMethod"),
        };

        if algorithms.canonicalization.as_deref() != Some(EXC_C14N) {
            self.issue(format!(
                "Invalid CanonicalizationMethod: expected {}, found {}",
                EXC_C14N,
                algorithms.canonicalization.as_deref().unwrap_or("none")
            ));
        }
        if algorithms.signature.as_deref() != Some(RSA_SHA256) {
            self.issue(format!(
                "Invalid SignatureMethod: expected {}, found {}",
                RSA_SHA256,
                algorithms.signature.as_deref().unwrap_or("none")
            ));
        }
        algorithms
    }

    fn check_reference(&mut self, reference: NodeId) -> (ReferenceRole, ReferenceDescriptor) {
        let doc = self.doc;
        let uri = doc.attribute(reference, "URI").map(str::to_string);
        let transforms: Vec<String> = find_all_dsig(doc, reference, "Transform")
            .into_iter()
            .map(|t| doc.attribute(t, "Algorithm").unwrap_or("").to_string())
            .collect();
        let digest_algorithm = self.algorithm_of(reference, "DigestMethod");
        let role = ReferenceRole::classify(uri.as_deref(), &transforms);
        let label = role.label();
        let before = self.issues.len();

        let c14n_at = transforms.iter().position(|t| t == EXC_C14N);
        if c14n_at.is_none() {
            self.issue(format!(
                "{} reference lacks the exclusive canonicalization transform",
                label
            ));
        }
        if digest_algorithm.as_deref() != Some(SHA256) {
            self.issue(format!(
                "Invalid DigestMethod in {} reference: expected {}, found {}",
                label,
                SHA256,
                digest_algorithm.as_deref().unwrap_or("none")
            ));
        }
        if role == ReferenceRole::Header {
            let enveloped_at = transforms.iter().position(|t| t == ENVELOPED_SIGNATURE);
            if let (Some(env), Some(c14n)) = (enveloped_at, c14n_at) {
                if env > c14n {
                    self.issue(
                        "AppHdr reference must apply the enveloped-signature transform before canonicalization",
                    );
                }
            }
        }
        for transform in &transforms {
            if !role.required_transforms().contains(&transform.as_str()) {
                self.issue(format!("Unsupported transform {} in {} reference", transform, label));
            }
        }

        let descriptor = ReferenceDescriptor {
            present: true,
            uri,
            transforms,
            digest_algorithm,
            valid: self.issues.len() == before,
        };
        (role, descriptor)
    }

    fn verify_cryptographically(
        &mut self,
        pem: &str,
        signature: NodeId,
        header: NodeId,
        references: &[(ReferenceRole, NodeId)],
    ) {
        let doc = self.doc;
        let key = match parse_certificate(pem.as_bytes()).and_then(|cert| public_key(&cert)) {
            Ok(key) => key,
            Err(e) => {
                self.issue(format!("Signature verification error: {}", e));
                return;
            }
        };

        for &(role, reference) in references {
            let target = match role {
                ReferenceRole::KeyInfo => doc
                    .attribute(reference, "URI")
                    .and_then(|uri| uri.strip_prefix('#'))
                    .and_then(|id| doc.element_by_id(id)),
                ReferenceRole::Header => Some(header),
                ReferenceRole::Body => sibling_body(doc, header),
            };
            let Some(target) = target else {
                self.issue(format!("{} reference does not resolve to an element", role.label()));
                continue;
            };

            let canonical = match role {
                ReferenceRole::Header => canonicalize_excluding(doc, target, Some(signature)),
                _ => canonicalize(doc, target),
            };
            let declared = find_dsig(doc, reference, "DigestValue")
                .map(|n| doc.text_content(n).trim().to_string())
                .unwrap_or_default();
            if digest_base64(&canonical) != declared {
                self.issue(format!("Digest mismatch for {} reference", role.label()));
            }
        }

        let Some(signed_info) = find_dsig(doc, signature, "SignedInfo") else {
            self.issue("SignedInfo not found");
            return;
        };
        let encoded: String = find_dsig(doc, signature, "SignatureValue")
            .map(|n| doc.text_content(n))
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        let bytes = match STANDARD.decode(encoded.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.issue(format!("SignatureValue is not valid base64: {}", e));
                return;
            }
        };
        let value = match Signature::try_from(bytes.as_slice()) {
            Ok(value) => value,
            Err(e) => {
                self.issue(format!("Invalid signature: {}", e));
                return;
            }
        };

        let verifying_key = VerifyingKey::<Sha256>::new(key);
        if let Err(e) = verifying_key.verify(canonicalize(doc, signed_info).as_bytes(), &value) {
            self.issue(format!("Invalid signature: {}", e));
        }
    }
}
