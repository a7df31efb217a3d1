//! Certificate and key handling
//!
//! X.509 certificates are parsed with `x509-cert`; RSA keys with `rsa`.
//! Failures are returned as plain messages so the signer can wrap them into
//! [`Error::Signing`](crate::Error::Signing) and the verifier into issues.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::Certificate;

/// Parse a certificate from PEM text or raw DER
pub fn parse_certificate(data: &[u8]) -> Result<Certificate, String> {
    let looks_pem = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .is_some_and(|start| data[start..].starts_with(b"-----BEGIN"));

    if looks_pem {
        Certificate::from_pem(data).map_err(|e| format!("Certificate parse error: {e}"))
    } else {
        Certificate::from_der(data).map_err(|e| format!("Certificate parse error: {e}"))
    }
}

/// DER encoding of a certificate in standard base64
pub fn certificate_base64(cert: &Certificate) -> Result<String, String> {
    let der = cert
        .to_der()
        .map_err(|e| format!("Certificate DER encoding error: {e}"))?;
    Ok(STANDARD.encode(der))
}

/// Issuer distinguished name (RFC 4514) and decimal serial number
pub fn issuer_and_serial(cert: &Certificate) -> (String, String) {
    let issuer = cert.tbs_certificate.issuer.to_string();
    let serial = serial_bytes_to_decimal_string(cert.tbs_certificate.serial_number.as_bytes());
    (issuer, serial)
}

/// RSA public key of a certificate
pub fn public_key(cert: &Certificate) -> Result<RsaPublicKey, String> {
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| format!("Public key encoding error: {e}"))?;
    RsaPublicKey::from_public_key_der(&spki).map_err(|e| format!("Certificate key is not RSA: {e}"))
}

/// Parse an RSA private key from PKCS#8 or PKCS#1 PEM
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, String> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| format!("Private key parse error: {e}"))
}

fn serial_bytes_to_decimal_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "0".to_string();
    }

    // little-endian base-10 digits
    let mut digits: Vec<u8> = vec![0];
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let value = (*digit as u32) * 256 + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    while digits.len() > 1 && matches!(digits.last(), Some(0)) {
        digits.pop();
    }

    digits.iter().rev().map(|d| (b'0' + *d) as char).collect()
}
