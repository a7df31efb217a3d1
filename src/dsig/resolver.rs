//! Certificate resolution
//!
//! The signature validator identifies the signer by issuer DN and serial
//! number and asks a [`CertificateResolver`] for the matching PEM
//! certificate. Resolution is the only asynchronous step of validation.

use async_trait::async_trait;
use thiserror::Error;

use super::certs::{issuer_and_serial, parse_certificate};

/// Failure reported by a resolver
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The backing store could not be reached
    #[error("certificate store unavailable: {0}")]
    Unavailable(String),

    /// Any other resolver failure
    #[error("{0}")]
    Other(String),
}

/// Look up a PEM certificate by issuer DN and serial number
#[async_trait]
pub trait CertificateResolver: Send + Sync {
    /// Resolve; `Ok(None)` means no certificate is known for the pair
    async fn resolve(&self, issuer_dn: &str, serial_number: &str) -> Result<Option<String>, ResolverError>;
}

/// Resolver holding a single certificate
#[derive(Debug, Clone)]
pub struct StaticCertificateResolver {
    pem: String,
    issuer_serial: Option<(String, String)>,
}

impl StaticCertificateResolver {
    /// Return `pem` for any issuer/serial pair
    pub fn new(pem: impl Into<String>) -> Self {
        Self {
            pem: pem.into(),
            issuer_serial: None,
        }
    }

    /// Return the certificate only for its own issuer/serial pair
    pub fn matching(pem: impl Into<String>) -> Result<Self, ResolverError> {
        let pem = pem.into();
        let cert = parse_certificate(pem.as_bytes()).map_err(ResolverError::Other)?;
        Ok(Self {
            issuer_serial: Some(issuer_and_serial(&cert)),
            pem,
        })
    }
}

#[async_trait]
impl CertificateResolver for StaticCertificateResolver {
    async fn resolve(&self, issuer_dn: &str, serial_number: &str) -> Result<Option<String>, ResolverError> {
        match &self.issuer_serial {
            Some((issuer, serial)) if issuer != issuer_dn || serial != serial_number => Ok(None),
            _ => Ok(Some(self.pem.clone())),
        }
    }
}

/// Resolver backed by a synchronous closure
pub struct FnResolver<F> {
    resolve: F,
}

impl<F> FnResolver<F>
where
    F: Fn(&str, &str) -> Result<Option<String>, ResolverError> + Send + Sync,
{
    /// Wrap a closure
    pub fn new(resolve: F) -> Self {
        Self { resolve }
    }
}

#[async_trait]
impl<F> CertificateResolver for FnResolver<F>
where
    F: Fn(&str, &str) -> Result<Option<String>, ResolverError> + Send + Sync,
{
    async fn resolve(&self, issuer_dn: &str, serial_number: &str) -> Result<Option<String>, ResolverError> {
        (self.resolve)(issuer_dn, serial_number)
    }
}
