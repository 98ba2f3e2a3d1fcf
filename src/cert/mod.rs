//! Certificate generation module.
//!
//! Template construction, extension encoding, signing, loading and the
//! root issuance pipeline.

pub mod ca;
pub mod extensions;
pub mod loader;
pub mod template;
pub mod x509_signing;
