//! Root CA issuance.
//!
//! This module runs the whole `create` pipeline: generate a key, build and
//! self-sign a root template for the requested IP addresses, then persist
//! the key and certificate PEM files.

use crate::cert::template::{
    apply_root_usages, build_template, parse_ip_addresses, CertificateTemplate,
};
use crate::cert::x509_signing::{sign_certificate, SignedCertificate};
use crate::config::IssuerConfig;
use crate::crypto::keygen::{create_rsa_key_pair, RsaKeyPair};
use crate::error::Result;
use crate::storage::artifacts::{save_artifacts, Artifact};
use rand::rngs::OsRng;
use std::path::PathBuf;
use tracing::{debug, info};

/// Default private key output path.
pub const DEFAULT_KEY_PATH: &str = "ca.key";

/// Default certificate output path.
pub const DEFAULT_CERT_PATH: &str = "ca.crt";

/// Default endpoint list.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1";

/// Inputs of one `create` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    /// Endpoint strings, possibly including ones that are not IP literals.
    pub ip_addresses: Vec<String>,
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
}

impl Default for CreateRequest {
    fn default() -> Self {
        Self {
            ip_addresses: vec![DEFAULT_ENDPOINT.to_string()],
            key_path: PathBuf::from(DEFAULT_KEY_PATH),
            cert_path: PathBuf::from(DEFAULT_CERT_PATH),
        }
    }
}

/// Everything a root issuance produced, still in memory.
#[derive(Debug, Clone)]
pub struct IssuedRoot {
    pub keypair: RsaKeyPair,
    pub template: CertificateTemplate,
    pub certificate: SignedCertificate,
    pub key_pem: Vec<u8>,
    pub cert_pem: Vec<u8>,
}

/// Generate a key and a self-signed root certificate for `ip_addresses`.
///
/// Nothing is written to disk. The certificate carries CA basic
/// constraints, keyCertSign and digitalSignature key usage, and serverAuth
/// and clientAuth extended key usage.
///
/// # Example
///
/// ```rust,no_run
/// use certctl::cert::ca::create_root_ca;
/// use certctl::config::IssuerConfig;
///
/// # fn example() -> certctl::error::Result<()> {
/// let issued = create_root_ca(&["127.0.0.1", "10.0.0.5"], &IssuerConfig::default())?;
/// assert!(issued.certificate.pem.contains("BEGIN CERTIFICATE"));
/// # Ok(())
/// # }
/// ```
pub fn create_root_ca<S: AsRef<str>>(
    ip_addresses: &[S],
    config: &IssuerConfig,
) -> Result<IssuedRoot> {
    let mut key_pem = Vec::new();
    let mut cert_pem = Vec::new();

    let keypair = create_rsa_key_pair(&mut OsRng, config.key_bits, &mut key_pem)?;
    debug!("\n{}", String::from_utf8_lossy(&key_pem));

    let addresses = parse_ip_addresses(ip_addresses, config.strict_addresses)?;
    debug!(?addresses, "parsed endpoint addresses");

    let mut template = build_template(&mut OsRng, true, addresses, config)?;
    apply_root_usages(&mut template);

    // Self-signed: the template is its own parent
    let certificate = sign_certificate(
        &template,
        &template,
        &keypair.public,
        &keypair.private,
        &mut cert_pem,
    )?;
    debug!("\n{}", String::from_utf8_lossy(&cert_pem));

    Ok(IssuedRoot {
        keypair,
        template,
        certificate,
        key_pem,
        cert_pem,
    })
}

/// Run `create`: issue a root and write the key and certificate files.
///
/// The key file is written before the certificate file. How a write
/// failure affects files already written depends on `config.write_mode`.
pub fn run_create(request: &CreateRequest, config: &IssuerConfig) -> Result<IssuedRoot> {
    debug!(
        ip = ?request.ip_addresses,
        key_file = %request.key_path.display(),
        cert_file = %request.cert_path.display(),
        "options used"
    );
    config.validate()?;

    let issued = create_root_ca(request.ip_addresses.as_slice(), config)?;

    save_artifacts(
        &[
            Artifact::new(request.key_path.clone(), issued.key_pem.clone()),
            Artifact::new(request.cert_path.clone(), issued.cert_pem.clone()),
        ],
        config.write_mode,
    )?;

    info!(
        key_file = %request.key_path.display(),
        cert_file = %request.cert_path.display(),
        serial = %hex::encode(issued.template.serial_number.to_be_bytes()),
        "issued self-signed root certificate"
    );

    Ok(issued)
}
