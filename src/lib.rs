//! certctl: self-signed RSA root certificates for local TLS.
//!
//! This library issues a self-signed X.509 certificate and its RSA key pair
//! for use as a development certificate authority or TLS endpoint identity.
//! An issuance run is a single linear pass:
//!
//! - generate an RSA key pair and PEM-encode the private key
//! - build a certificate template (serial, subject, validity, IP SANs, usages)
//! - self-sign the template with the generated key
//! - write the key and certificate PEM files
//!
//! All operations return `Result` types with a typed error for every failure
//! class; nothing is retried.
//!
//! # Example
//!
//! ```rust,no_run
//! use certctl::cert::ca::{run_create, CreateRequest};
//! use certctl::config::IssuerConfig;
//!
//! fn example() -> certctl::Result<()> {
//!     let request = CreateRequest {
//!         ip_addresses: vec!["127.0.0.1".to_string(), "10.0.0.5".to_string()],
//!         ..CreateRequest::default()
//!     };
//!     let issued = run_create(&request, &IssuerConfig::default())?;
//!     println!("serial {:032x}", issued.template.serial_number);
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use config::IssuerConfig;
pub use error::{CertCtlError, Result};

/// PEM-encode `contents` under `tag` with LF line endings.
pub(crate) fn encode_pem(tag: &str, contents: Vec<u8>) -> String {
    let config = pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF);
    pem::encode_config(&pem::Pem::new(tag, contents), config)
}
