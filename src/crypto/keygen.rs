//! RSA key operations.
//!
//! This module generates the RSA key pair an issuance run signs with and
//! serializes the private half as a PKCS#1 "RSA PRIVATE KEY" PEM block.

use crate::error::{CertCtlError, Result};
use rand::{CryptoRng, RngCore};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use rustls_pemfile::Item;
use std::io::{Cursor, Write};
use tracing::debug;

/// PEM label of a PKCS#1 RSA private key.
pub const RSA_PRIVATE_KEY_TAG: &str = "RSA PRIVATE KEY";

/// An RSA keypair consisting of a private key and its public key.
#[derive(Debug, Clone)]
pub struct RsaKeyPair {
    pub private: RsaPrivateKey,
    pub public: RsaPublicKey,
}

impl RsaKeyPair {
    /// Create a keypair from a private key.
    pub fn from_private(private: RsaPrivateKey) -> Self {
        let public = private.to_public_key();
        Self { private, public }
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.n().bits()
    }

    /// PKCS#1 DER encoding of the private key.
    pub fn private_key_der(&self) -> Result<Vec<u8>> {
        let der = self.private.to_pkcs1_der().map_err(|e| {
            CertCtlError::GenerationError(format!("Failed to encode private key: {}", e))
        })?;
        Ok(der.as_bytes().to_vec())
    }
}

/// Generate an RSA keypair of `bits` and write its PEM encoding to `sink`.
///
/// The bit length is handed to the RSA primitive as is; whatever it rejects
/// surfaces as [`CertCtlError::GenerationError`]. Nothing is retried.
///
/// # Example
///
/// ```rust,no_run
/// use certctl::crypto::keygen::create_rsa_key_pair;
/// use rand::rngs::OsRng;
/// # fn example() -> certctl::error::Result<()> {
/// let mut pem = Vec::new();
/// let keypair = create_rsa_key_pair(&mut OsRng, 2048, &mut pem)?;
/// assert_eq!(keypair.bits(), 2048);
/// assert!(String::from_utf8_lossy(&pem).contains("BEGIN RSA PRIVATE KEY"));
/// # Ok(())
/// # }
/// ```
pub fn create_rsa_key_pair<R, W>(rng: &mut R, bits: usize, sink: &mut W) -> Result<RsaKeyPair>
where
    R: RngCore + CryptoRng,
    W: Write + ?Sized,
{
    debug!(bits, "generating RSA key pair");
    let private = RsaPrivateKey::new(rng, bits).map_err(|e| {
        CertCtlError::GenerationError(format!("Failed to generate {}-bit RSA key: {}", bits, e))
    })?;
    let keypair = RsaKeyPair::from_private(private);

    let pem = private_key_to_pem(&keypair)?;
    sink.write_all(pem.as_bytes()).map_err(|e| {
        CertCtlError::GenerationError(format!("Failed to write private key PEM: {}", e))
    })?;

    Ok(keypair)
}

/// Encode the private key as an "RSA PRIVATE KEY" PEM block.
pub fn private_key_to_pem(keypair: &RsaKeyPair) -> Result<String> {
    let der = keypair.private_key_der()?;
    Ok(crate::encode_pem(RSA_PRIVATE_KEY_TAG, der))
}

/// Load an RSA private key from PEM.
///
/// Accepts PKCS#1 ("RSA PRIVATE KEY") and PKCS#8 ("PRIVATE KEY") blocks.
pub fn load_private_key_from_pem(pem_str: &str) -> Result<RsaKeyPair> {
    let mut cursor = Cursor::new(pem_str.as_bytes());

    let private = match rustls_pemfile::read_one(&mut cursor)
        .map_err(|e| CertCtlError::PemError(format!("Failed to read PEM: {}", e)))?
    {
        Some(Item::Pkcs1Key(key)) => RsaPrivateKey::from_pkcs1_der(key.secret_pkcs1_der())
            .map_err(|e| CertCtlError::PemError(format!("Invalid PKCS#1 key: {}", e)))?,
        Some(Item::Pkcs8Key(key)) => RsaPrivateKey::from_pkcs8_der(key.secret_pkcs8_der())
            .map_err(|e| CertCtlError::PemError(format!("Invalid PKCS#8 key: {}", e)))?,
        Some(_) => {
            return Err(CertCtlError::PemError(
                "PEM file does not contain an RSA private key".to_string(),
            ))
        }
        None => return Err(CertCtlError::PemError("Empty PEM file".to_string())),
    };

    Ok(RsaKeyPair::from_private(private))
}
