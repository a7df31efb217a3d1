//! Signature generation
//!
//! Builds the enveloped three-reference signature and places it in
//! `AppHdr/Sgntr`, replacing whatever the container held before.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use tracing::info;
use x509_cert::Certificate;

use super::c14n::{canonicalize, canonicalize_excluding, digest_base64};
use super::certs::{certificate_base64, issuer_and_serial, parse_certificate, parse_private_key};
use super::{
    ReferenceRole, BODY_ELEMENT, BODY_ID, DEFAULT_KEY_INFO_ID, EXC_C14N, HEADER_ELEMENT, HEADER_ID,
    RSA_SHA256, SHA256, SIGNATURE_CONTAINER,
};
use crate::documents::{Document, NodeId};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::DSIG_NAMESPACE;

/// Signs SPI envelopes with one RSA key and its certificate
#[derive(Debug, Clone)]
pub struct XmlSigner {
    certificate: Certificate,
    private_key: RsaPrivateKey,
    key_info_id: String,
}

impl XmlSigner {
    /// Create a signer from parsed credentials
    pub fn new(certificate: Certificate, private_key: RsaPrivateKey) -> Self {
        Self {
            certificate,
            private_key,
            key_info_id: DEFAULT_KEY_INFO_ID.to_string(),
        }
    }

    /// Create a signer from a PEM certificate and a PKCS#8 or PKCS#1 PEM key
    pub fn from_pem(cert_pem: &str, private_key_pem: &str) -> Result<Self> {
        let certificate = parse_certificate(cert_pem.as_bytes()).map_err(Error::Signing)?;
        let private_key = parse_private_key(private_key_pem).map_err(Error::Signing)?;
        Ok(Self::new(certificate, private_key))
    }

    /// Use another `Id` for the `KeyInfo` element
    pub fn with_key_info_id(mut self, id: impl Into<String>) -> Self {
        self.key_info_id = id.into();
        self
    }

    /// The signing certificate
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Sign document text and return the signed text
    pub fn sign_xml(&self, xml: &str) -> Result<String> {
        self.sign_xml_with_limits(xml, &Limits::default())
    }

    /// Sign document text parsed under explicit limits
    pub fn sign_xml_with_limits(&self, xml: &str, limits: &Limits) -> Result<String> {
        let mut doc = Document::parse_with_limits(xml, limits)?;
        self.sign_document(&mut doc)?;
        Ok(doc.to_xml())
    }

    /// Sign a parsed document in place
    pub fn sign_document(&self, doc: &mut Document) -> Result<()> {
        if self.key_info_id.is_empty() || self.key_info_id == HEADER_ID || self.key_info_id == BODY_ID {
            return Err(Error::Signing(format!(
                "unusable KeyInfo Id \"{}\"",
                self.key_info_id
            )));
        }

        let root = doc
            .root()
            .ok_or_else(|| Error::Signing("document has no root element".to_string()))?;
        let header = doc
            .child_by_name(root, HEADER_ELEMENT)
            .ok_or_else(|| Error::Signing(format!("missing <{}> element", HEADER_ELEMENT)))?;
        let body = doc
            .child_by_name(root, BODY_ELEMENT)
            .ok_or_else(|| Error::Signing(format!("missing <{}> element", BODY_ELEMENT)))?;

        let certificate_b64 = certificate_base64(&self.certificate).map_err(Error::Signing)?;
        let (issuer, serial) = issuer_and_serial(&self.certificate);

        doc.set_attribute(header, "Id", HEADER_ID);
        doc.set_attribute(body, "Id", BODY_ID);

        let container = match doc.child_by_name(header, SIGNATURE_CONTAINER) {
            Some(existing) => existing,
            None => {
                let (prefix, namespace) = doc
                    .element(header)
                    .map(|e| (e.prefix.clone(), e.namespace.clone()))
                    .unwrap_or_default();
                let created = doc.create_element(prefix.as_deref(), SIGNATURE_CONTAINER, namespace.as_deref());
                doc.append_child(header, created);
                created
            }
        };
        doc.remove_children(container);

        let signature = doc.create_element(None, "Signature", Some(DSIG_NAMESPACE));
        doc.declare_namespace(signature, None, DSIG_NAMESPACE);
        doc.append_child(container, signature);

        let signed_info = add_element(doc, signature, "SignedInfo");
        let method = add_element(doc, signed_info, "CanonicalizationMethod");
        doc.set_attribute(method, "Algorithm", EXC_C14N);
        let method = add_element(doc, signed_info, "SignatureMethod");
        doc.set_attribute(method, "Algorithm", RSA_SHA256);

        let mut digest_slots = Vec::with_capacity(ReferenceRole::ALL.len());
        for role in ReferenceRole::ALL {
            let reference = add_element(doc, signed_info, "Reference");
            match role {
                ReferenceRole::KeyInfo => {
                    doc.set_attribute(reference, "URI", &format!("#{}", self.key_info_id))
                }
                ReferenceRole::Header => doc.set_attribute(reference, "URI", ""),
                ReferenceRole::Body => {}
            }
            let transforms = add_element(doc, reference, "Transforms");
            for algorithm in role.required_transforms() {
                let transform = add_element(doc, transforms, "Transform");
                doc.set_attribute(transform, "Algorithm", algorithm);
            }
            let digest_method = add_element(doc, reference, "DigestMethod");
            doc.set_attribute(digest_method, "Algorithm", SHA256);
            digest_slots.push((role, add_element(doc, reference, "DigestValue")));
        }

        let signature_value = add_element(doc, signature, "SignatureValue");

        let key_info = add_element(doc, signature, "KeyInfo");
        doc.set_attribute(key_info, "Id", &self.key_info_id);
        let x509_data = add_element(doc, key_info, "X509Data");
        add_text_element(doc, x509_data, "X509Certificate", &certificate_b64);
        let issuer_serial = add_element(doc, x509_data, "X509IssuerSerial");
        add_text_element(doc, issuer_serial, "X509IssuerName", &issuer);
        add_text_element(doc, issuer_serial, "X509SerialNumber", &serial);

        for (role, slot) in digest_slots {
            let canonical = match role {
                ReferenceRole::KeyInfo => canonicalize(doc, key_info),
                ReferenceRole::Header => canonicalize_excluding(doc, header, Some(signature)),
                ReferenceRole::Body => canonicalize(doc, body),
            };
            let text = doc.create_text(digest_base64(&canonical));
            doc.append_child(slot, text);
        }

        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let value = signing_key
            .try_sign(canonicalize(doc, signed_info).as_bytes())
            .map_err(|e| Error::Signing(format!("RSA signing failed: {e}")))?;
        let text = doc.create_text(STANDARD.encode(value.to_bytes()));
        doc.append_child(signature_value, text);

        info!(
            key_info_id = %self.key_info_id,
            issuer = %issuer,
            serial = %serial,
            "document signed"
        );
        Ok(())
    }
}

fn add_element(doc: &mut Document, parent: NodeId, local_name: &str) -> NodeId {
    let element = doc.create_element(None, local_name, Some(DSIG_NAMESPACE));
    doc.append_child(parent, element);
    element
}

fn add_text_element(doc: &mut Document, parent: NodeId, local_name: &str, text: &str) -> NodeId {
    let element = add_element(doc, parent, local_name);
    let text = doc.create_text(text);
    doc.append_child(element, text);
    element
}
