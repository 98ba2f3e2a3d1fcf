//! Certificate templates.
//!
//! A [`CertificateTemplate`] describes everything that goes into a
//! certificate except the subject key and the signature: serial number,
//! subject, validity window, CA flag, IP SANs and usage bits.

use crate::config::{IssuerConfig, ValidityPeriod};
use crate::error::{CertCtlError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rand::{CryptoRng, RngCore};
use std::net::IpAddr;
use std::ops::BitOr;
use tracing::debug;

/// Key usage bits, numbered as in the RFC 5280 KeyUsage BIT STRING.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyUsageFlags(u16);

impl KeyUsageFlags {
    pub const DIGITAL_SIGNATURE: Self = Self(1 << 0);
    pub const CONTENT_COMMITMENT: Self = Self(1 << 1);
    pub const KEY_ENCIPHERMENT: Self = Self(1 << 2);
    pub const DATA_ENCIPHERMENT: Self = Self(1 << 3);
    pub const KEY_AGREEMENT: Self = Self(1 << 4);
    pub const CERT_SIGN: Self = Self(1 << 5);
    pub const CRL_SIGN: Self = Self(1 << 6);
    pub const ENCIPHER_ONLY: Self = Self(1 << 7);
    pub const DECIPHER_ONLY: Self = Self(1 << 8);

    /// Highest bit number defined by RFC 5280.
    pub const MAX_BIT: u8 = 8;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether bit number `bit` is set.
    pub const fn has_bit(&self, bit: u8) -> bool {
        bit <= Self::MAX_BIT && self.0 & (1 << bit) != 0
    }

    /// Build flags from RFC 5280 bit numbers, ignoring unknown bits.
    pub fn from_bit_numbers(bits: impl IntoIterator<Item = u8>) -> Self {
        let mut flags = Self::empty();
        for bit in bits {
            if bit <= Self::MAX_BIT {
                flags.0 |= 1 << bit;
            }
        }
        flags
    }
}

impl BitOr for KeyUsageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Extended key usage purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtKeyUsage {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
}

impl ExtKeyUsage {
    pub fn oid(&self) -> const_oid::ObjectIdentifier {
        use const_oid::db::rfc5280;
        match self {
            ExtKeyUsage::ServerAuth => rfc5280::ID_KP_SERVER_AUTH,
            ExtKeyUsage::ClientAuth => rfc5280::ID_KP_CLIENT_AUTH,
            ExtKeyUsage::CodeSigning => rfc5280::ID_KP_CODE_SIGNING,
            ExtKeyUsage::EmailProtection => rfc5280::ID_KP_EMAIL_PROTECTION,
            ExtKeyUsage::TimeStamping => rfc5280::ID_KP_TIME_STAMPING,
            ExtKeyUsage::OcspSigning => rfc5280::ID_KP_OCSP_SIGNING,
        }
    }

    pub fn from_oid(oid: &const_oid::ObjectIdentifier) -> Option<Self> {
        [
            ExtKeyUsage::ServerAuth,
            ExtKeyUsage::ClientAuth,
            ExtKeyUsage::CodeSigning,
            ExtKeyUsage::EmailProtection,
            ExtKeyUsage::TimeStamping,
            ExtKeyUsage::OcspSigning,
        ]
        .into_iter()
        .find(|usage| usage.oid() == *oid)
    }
}

/// Subject identity of a certificate: its organization attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectName {
    pub organizations: Vec<String>,
}

impl SubjectName {
    /// A subject carrying a single organization.
    pub fn organization(name: impl Into<String>) -> Self {
        Self {
            organizations: vec![name.into()],
        }
    }
}

/// In-memory description of a certificate to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateTemplate {
    pub serial_number: u128,
    pub subject: SubjectName,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub is_ca: bool,
    pub basic_constraints_valid: bool,
    /// IP SAN entries in input order. `None` marks an address that did not
    /// parse; signing rejects a template that still carries one.
    pub ip_addresses: Vec<Option<IpAddr>>,
    pub key_usage: KeyUsageFlags,
    pub ext_key_usage: Vec<ExtKeyUsage>,
}

/// Draw a serial number uniformly from [0, 2^128).
pub fn generate_serial_number<R>(rng: &mut R) -> Result<u128>
where
    R: RngCore + CryptoRng,
{
    let mut bytes = [0u8; 16];
    rng.try_fill_bytes(&mut bytes).map_err(|e| {
        CertCtlError::SerialGenerationError(format!("Failed to generate serial number: {}", e))
    })?;
    Ok(u128::from_be_bytes(bytes))
}

/// Parse endpoint strings into SAN entries.
///
/// In lenient mode an unparseable string yields a `None` entry at its
/// position. In strict mode it fails with [`CertCtlError::InvalidAddress`].
///
/// # Example
///
/// ```
/// use certctl::cert::template::parse_ip_addresses;
///
/// let addresses = parse_ip_addresses(&["127.0.0.1", "not-an-ip"], false).unwrap();
/// assert!(addresses[0].is_some());
/// assert!(addresses[1].is_none());
/// assert!(parse_ip_addresses(&["not-an-ip"], true).is_err());
/// ```
pub fn parse_ip_addresses<S: AsRef<str>>(raw: &[S], strict: bool) -> Result<Vec<Option<IpAddr>>> {
    raw.iter()
        .map(|addr| {
            let addr = addr.as_ref();
            match addr.parse::<IpAddr>() {
                Ok(ip) => Ok(Some(ip)),
                Err(_) if strict => Err(CertCtlError::InvalidAddress(format!(
                    "'{}' is not an IP address",
                    addr
                ))),
                Err(_) => Ok(None),
            }
        })
        .collect()
}

/// Current time truncated to whole seconds.
pub fn now_seconds() -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).ok_or_else(|| {
        CertCtlError::CertificateError("Current time is out of range".to_string())
    })
}

/// Add calendar years to `start`, keeping month, day and time of day.
///
/// A 29 February start lands on 1 March when the target year is not a
/// leap year.
pub fn add_calendar_years(start: DateTime<Utc>, years: u32) -> Option<DateTime<Utc>> {
    let target_year = start.year().checked_add(i32::try_from(years).ok()?)?;
    let date = NaiveDate::from_ymd_opt(target_year, start.month(), start.day())
        .or_else(|| NaiveDate::from_ymd_opt(target_year, 3, 1))?;
    Some(Utc.from_utc_datetime(&date.and_time(start.time())))
}

/// Compute NotAfter for a validity period starting at `not_before`.
pub fn validity_end(not_before: DateTime<Utc>, period: ValidityPeriod) -> Result<DateTime<Utc>> {
    let not_after = match period {
        ValidityPeriod::Years(years) => add_calendar_years(not_before, years),
        ValidityPeriod::Days(days) => not_before.checked_add_signed(Duration::days(days.into())),
    }
    .ok_or_else(|| {
        CertCtlError::CertificateError(format!("Validity period {:?} is out of range", period))
    })?;

    if not_after <= not_before {
        return Err(CertCtlError::CertificateError(
            "NotAfter must be later than NotBefore".to_string(),
        ));
    }
    Ok(not_after)
}

/// Build a certificate template.
///
/// Draws a fresh serial, sets the configured subject organization, a
/// validity window starting now and the CA flag. The addresses are attached
/// verbatim. No key usage is set here; see [`apply_root_usages`].
pub fn build_template<R>(
    rng: &mut R,
    is_ca: bool,
    ip_addresses: Vec<Option<IpAddr>>,
    config: &IssuerConfig,
) -> Result<CertificateTemplate>
where
    R: RngCore + CryptoRng,
{
    let serial_number = generate_serial_number(rng)?;
    let not_before = now_seconds()?;
    let not_after = validity_end(not_before, config.validity_period)?;

    debug!(
        serial = %hex::encode(serial_number.to_be_bytes()),
        %not_before,
        %not_after,
        is_ca,
        "built certificate template"
    );

    Ok(CertificateTemplate {
        serial_number,
        subject: SubjectName::organization(config.subject_organization.clone()),
        not_before,
        not_after,
        is_ca,
        basic_constraints_valid: true,
        ip_addresses,
        key_usage: KeyUsageFlags::empty(),
        ext_key_usage: Vec::new(),
    })
}

/// Set the usages of a root certificate that also serves TLS endpoints.
pub fn apply_root_usages(template: &mut CertificateTemplate) {
    template.key_usage = KeyUsageFlags::CERT_SIGN | KeyUsageFlags::DIGITAL_SIGNATURE;
    template.ext_key_usage = vec![ExtKeyUsage::ServerAuth, ExtKeyUsage::ClientAuth];
}
