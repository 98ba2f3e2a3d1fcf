//! Certificate loading and inspection.
//!
//! This module reads certificates back from PEM files, extracts the fields
//! an issuance run controls and checks signatures.

use crate::cert::extensions::decode_extensions;
use crate::cert::template::{ExtKeyUsage, KeyUsageFlags};
use crate::cert::x509_signing::sha256_with_rsa_algorithm;
use crate::error::{CertCtlError, Result};
use chrono::{DateTime, Utc};
use der::{Decode, Encode};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use rustls_pemfile::Item;
use sha2::Sha256;
use std::io::Cursor;
use std::net::IpAddr;
use x509_cert::certificate::Certificate;
use x509_cert::name::RdnSequence;
use x509_cert::time::Time;

/// Load every certificate of a PEM string as DER bytes, skipping other items.
///
/// A single certificate file yields one entry, a bundle one per certificate
/// in file order.
///
/// # Example
///
/// ```rust,no_run
/// use certctl::cert::loader::{load_certificates_from_pem, parse_certificate_der};
///
/// # fn example() -> certctl::error::Result<()> {
/// let pem = std::fs::read_to_string("ca.crt")?;
/// for der in load_certificates_from_pem(&pem)? {
///     let cert = parse_certificate_der(&der)?;
///     println!("{}", cert.tbs_certificate.subject);
/// }
/// # Ok(())
/// # }
/// ```
pub fn load_certificates_from_pem(pem_str: &str) -> Result<Vec<Vec<u8>>> {
    let mut cursor = Cursor::new(pem_str.as_bytes());
    let mut certificates = Vec::new();

    loop {
        match rustls_pemfile::read_one(&mut cursor)
            .map_err(|e| CertCtlError::PemError(format!("Failed to read PEM: {}", e)))?
        {
            Some(Item::X509Certificate(cert_der)) => {
                certificates.push(cert_der.to_vec());
            }
            Some(_) => continue,
            None => break,
        }
    }

    if certificates.is_empty() {
        return Err(CertCtlError::PemError(
            "No certificates found in PEM file".to_string(),
        ));
    }

    Ok(certificates)
}

/// Parse DER bytes into a certificate.
pub fn parse_certificate_der(der: &[u8]) -> Result<Certificate> {
    Certificate::from_der(der)
        .map_err(|e| CertCtlError::CertificateError(format!("Failed to decode certificate: {}", e)))
}

/// Decoded view of the fields an issuance run sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub serial_number: u128,
    pub subject: String,
    pub issuer: String,
    pub organizations: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub is_ca: bool,
    pub key_usage: KeyUsageFlags,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub ip_addresses: Vec<Option<IpAddr>>,
    pub subject_key_id: Option<Vec<u8>>,
    pub public_key_bits: usize,
}

impl CertificateInfo {
    pub fn from_certificate(cert: &Certificate) -> Result<Self> {
        let tbs = &cert.tbs_certificate;
        let extensions = decode_extensions(tbs.extensions.as_ref())?;
        let public_key = public_key_from_certificate(cert)?;

        Ok(Self {
            serial_number: serial_to_u128(tbs.serial_number.as_bytes())?,
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            organizations: organizations(&tbs.subject),
            not_before: time_to_utc(&tbs.validity.not_before)?,
            not_after: time_to_utc(&tbs.validity.not_after)?,
            is_ca: extensions.is_ca.unwrap_or(false),
            key_usage: extensions.key_usage,
            ext_key_usage: extensions.ext_key_usage,
            ip_addresses: extensions.ip_addresses,
            subject_key_id: extensions.subject_key_id,
            public_key_bits: public_key.n().bits(),
        })
    }

    /// Whether the subject and issuer names are identical.
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}

/// Extract the RSA public key a certificate certifies.
pub fn public_key_from_certificate(cert: &Certificate) -> Result<RsaPublicKey> {
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| CertCtlError::CertificateError(format!("Failed to encode SPKI: {}", e)))?;

    RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| CertCtlError::CertificateError(format!("Not an RSA public key: {}", e)))
}

/// Verify the certificate signature against `issuer_key`.
pub fn verify_signature(cert: &Certificate, issuer_key: &RsaPublicKey) -> Result<()> {
    if cert.signature_algorithm.oid != sha256_with_rsa_algorithm().oid {
        return Err(CertCtlError::VerificationError(format!(
            "Unsupported signature algorithm: {}",
            cert.signature_algorithm.oid
        )));
    }

    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| CertCtlError::CertificateError(format!("Failed to encode TBS: {}", e)))?;
    let signature = Signature::try_from(cert.signature.raw_bytes())
        .map_err(|e| CertCtlError::VerificationError(format!("Malformed signature: {}", e)))?;

    VerifyingKey::<Sha256>::new(issuer_key.clone())
        .verify(&tbs_der, &signature)
        .map_err(|e| {
            CertCtlError::VerificationError(format!("Signature verification failed: {}", e))
        })
}

/// Verify a certificate against its own embedded public key.
pub fn verify_self_signed(cert: &Certificate) -> Result<()> {
    let public_key = public_key_from_certificate(cert)?;
    verify_signature(cert, &public_key)
}

fn serial_to_u128(bytes: &[u8]) -> Result<u128> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let significant = &bytes[start..];
    if significant.len() > 16 {
        return Err(CertCtlError::CertificateError(format!(
            "Serial number longer than 128 bits: {}",
            hex::encode(bytes)
        )));
    }

    let mut buf = [0u8; 16];
    buf[16 - significant.len()..].copy_from_slice(significant);
    Ok(u128::from_be_bytes(buf))
}

fn organizations(name: &RdnSequence) -> Vec<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .filter(|atv| atv.oid == const_oid::db::rfc4519::O)
        .filter_map(|atv| std::str::from_utf8(atv.value.value()).ok())
        .map(str::to_string)
        .collect()
}

fn time_to_utc(time: &Time) -> Result<DateTime<Utc>> {
    let secs = i64::try_from(time.to_unix_duration().as_secs())
        .map_err(|_| CertCtlError::CertificateError("Timestamp out of range".to_string()))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| CertCtlError::CertificateError("Timestamp out of range".to_string()))
}
