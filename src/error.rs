//! Error types for certctl.
//!
//! Every failure in an issuance run maps to one variant here and is returned
//! to the caller unchanged. Nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for certctl operations.
#[derive(Error, Debug)]
pub enum CertCtlError {
    /// Randomness source or RSA key-generation failure
    #[error("Key generation error: {0}")]
    GenerationError(String),

    /// Randomness failure while drawing a serial number
    #[error("Serial number generation error: {0}")]
    SerialGenerationError(String),

    /// Signing primitive, extension encoding or DER round-trip failure
    #[error("Signing error: {0}")]
    SigningError(String),

    /// An output file could not be created, written or moved into place
    #[error("Failed to write {}: {source}", .path.display())]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An endpoint string is not an IP literal (strict mode only)
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    /// PEM encoding/decoding error
    #[error("PEM error: {0}")]
    PemError(String),

    /// Certificate decoding or inspection error
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Signature verification failed
    #[error("Verification error: {0}")]
    VerificationError(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Storage I/O error while reading
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),

    /// JSON configuration error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for certctl operations.
pub type Result<T> = std::result::Result<T, CertCtlError>;
