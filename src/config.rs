//! Issuance configuration.
//!
//! Every tunable of an issuance run lives in [`IssuerConfig`] and is passed
//! explicitly to the functions that need it. The defaults reproduce the
//! classic behavior: 2048-bit keys, one calendar year of validity and the
//! `Org.Inc` subject organization.

use crate::error::{CertCtlError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default RSA modulus size in bits.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Default subject organization.
pub const DEFAULT_ORGANIZATION: &str = "Org.Inc";

/// Log verbosity requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    #[default]
    Info,
    Debug,
}

impl Verbosity {
    /// The `tracing` filter directive matching this verbosity.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
        }
    }
}

/// How long an issued certificate stays valid after NotBefore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityPeriod {
    /// Calendar years: same month, day and time-of-day `n` years later.
    Years(u32),
    /// A fixed number of 24-hour days.
    Days(u32),
}

impl Default for ValidityPeriod {
    fn default() -> Self {
        ValidityPeriod::Years(1)
    }
}

/// How output artifacts reach the filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Write every artifact to a temporary sibling, then rename all of them
    /// into place once every write succeeded.
    #[default]
    Staged,
    /// Truncate and write each target in place, one after the other.
    Direct,
}

/// Configuration for one issuance run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IssuerConfig {
    pub verbosity: Verbosity,
    pub key_bits: usize,
    pub validity_period: ValidityPeriod,
    pub subject_organization: String,
    /// Reject endpoint strings that are not IP literals instead of
    /// recording a null SAN entry.
    pub strict_addresses: bool,
    pub write_mode: WriteMode,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            key_bits: DEFAULT_KEY_BITS,
            validity_period: ValidityPeriod::default(),
            subject_organization: DEFAULT_ORGANIZATION.to_string(),
            strict_addresses: false,
            write_mode: WriteMode::default(),
        }
    }
}

impl IssuerConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IssuerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use certctl::config::IssuerConfig;
    /// use std::path::Path;
    ///
    /// # fn example() -> certctl::error::Result<()> {
    /// let config = IssuerConfig::from_json_file(Path::new("certctl.json"))?;
    /// println!("issuing {}-bit keys", config.key_bits);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check values the issuance pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.key_bits == 0 {
            return Err(CertCtlError::ConfigError(
                "key_bits must be greater than zero".to_string(),
            ));
        }

        match self.validity_period {
            ValidityPeriod::Years(0) | ValidityPeriod::Days(0) => {
                return Err(CertCtlError::ConfigError(
                    "validity period must be greater than zero".to_string(),
                ))
            }
            _ => {}
        }

        if self.subject_organization.trim().is_empty() {
            return Err(CertCtlError::ConfigError(
                "subject_organization cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
