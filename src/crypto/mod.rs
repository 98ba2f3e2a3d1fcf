//! Cryptographic operations module.
//!
//! Provides RSA key generation and private key PEM handling.
//!
//! # Example
//!
//! ```rust,no_run
//! use certctl::crypto::keygen::{create_rsa_key_pair, load_private_key_from_pem};
//! use rand::rngs::OsRng;
//!
//! # fn example() -> certctl::error::Result<()> {
//! let mut pem = Vec::new();
//! let keypair = create_rsa_key_pair(&mut OsRng, 2048, &mut pem)?;
//! let loaded = load_private_key_from_pem(&String::from_utf8_lossy(&pem))?;
//! assert_eq!(keypair.public, loaded.public);
//! # Ok(())
//! # }
//! ```

pub mod keygen;
