//! Output storage module.
//!
//! Persists the PEM artifacts of an issuance run.

pub mod artifacts;
