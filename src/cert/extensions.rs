//! X.509 v3 extension encoding for certificate templates.
//!
//! The encoders turn template fields into DER `Extension` values. The
//! decoders read the same extensions back from a parsed certificate.

use crate::cert::template::{CertificateTemplate, ExtKeyUsage, KeyUsageFlags};
use crate::error::{CertCtlError, Result};
use const_oid::db::rfc5280::{
    ID_CE_BASIC_CONSTRAINTS, ID_CE_EXT_KEY_USAGE, ID_CE_KEY_USAGE, ID_CE_SUBJECT_ALT_NAME,
    ID_CE_SUBJECT_KEY_IDENTIFIER,
};
use const_oid::ObjectIdentifier;
use der::asn1::{BitString, OctetString};
use der::{Decode, Encode};
use sha2::{Digest, Sha256};
use spki::SubjectPublicKeyInfoOwned;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, SubjectAltName};
use x509_cert::ext::{Extension, Extensions};

/// Length of a subject key identifier, in bytes.
const KEY_IDENTIFIER_LEN: usize = 20;

fn encoding_error(what: &str, e: der::Error) -> CertCtlError {
    CertCtlError::SigningError(format!("Failed to encode {}: {}", what, e))
}

fn extension(oid: ObjectIdentifier, critical: bool, value: Vec<u8>) -> Result<Extension> {
    Ok(Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(value).map_err(|e| encoding_error("extension value", e))?,
    })
}

/// Encode key usage flags as a DER BIT STRING with trailing zero bits
/// removed.
pub fn key_usage_bit_string(flags: KeyUsageFlags) -> Result<BitString> {
    let mut bytes = [0u8; 2];
    for bit in 0..=KeyUsageFlags::MAX_BIT {
        if flags.has_bit(bit) {
            bytes[usize::from(bit / 8)] |= 0x80 >> (bit % 8);
        }
    }

    let len = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    let unused_bits = if len == 0 {
        0
    } else {
        bytes[len - 1].trailing_zeros() as u8
    };

    BitString::new(unused_bits, &bytes[..len]).map_err(|e| encoding_error("key usage", e))
}

/// Decode a key usage BIT STRING.
pub fn key_usage_from_bit_string(bits: &BitString) -> KeyUsageFlags {
    KeyUsageFlags::from_bit_numbers(
        bits.bits()
            .enumerate()
            .filter(|(_, set)| *set)
            .filter_map(|(i, _)| u8::try_from(i).ok()),
    )
}

/// Raw iPAddress octets for a SAN entry.
///
/// IPv4 and IPv4-mapped IPv6 addresses take four octets, other IPv6
/// addresses sixteen, and a null entry none. A certificate carrying an
/// empty entry fails [`check_ip_address_lengths`].
pub fn ip_address_octets(address: Option<&IpAddr>) -> Vec<u8> {
    match address {
        Some(IpAddr::V4(v4)) => v4.octets().to_vec(),
        Some(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.octets().to_vec(),
            None => v6.octets().to_vec(),
        },
        None => Vec::new(),
    }
}

/// Inverse of [`ip_address_octets`]; lengths other than 4 or 16 map to `None`.
pub fn ip_address_from_octets(octets: &[u8]) -> Option<IpAddr> {
    match octets.len() {
        4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(octets);
            Some(IpAddr::V4(Ipv4Addr::from(buf)))
        }
        16 => {
            let mut buf = [0u8; 16];
            buf.copy_from_slice(octets);
            Some(IpAddr::V6(Ipv6Addr::from(buf)))
        }
        _ => None,
    }
}

/// Reject iPAddress SAN entries whose length is neither 4 nor 16 octets.
///
/// Runs on a freshly signed certificate; a failure is a
/// [`CertCtlError::SigningError`].
pub fn check_ip_address_lengths(extensions: Option<&Extensions>) -> Result<()> {
    for ext in extensions
        .into_iter()
        .flatten()
        .filter(|ext| ext.extn_id == ID_CE_SUBJECT_ALT_NAME)
    {
        let san = SubjectAltName::from_der(ext.extn_value.as_bytes()).map_err(|e| {
            CertCtlError::SigningError(format!("Failed to parse subject alternative name: {}", e))
        })?;
        for name in &san.0 {
            if let GeneralName::IpAddress(octets) = name {
                let len = octets.as_bytes().len();
                if len != 4 && len != 16 {
                    return Err(CertCtlError::SigningError(format!(
                        "cannot parse IP address of length {}",
                        len
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Subject key identifier: the leftmost 160 bits of the SHA-256 hash of the
/// subjectPublicKey bits.
pub fn subject_key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    let digest = Sha256::digest(spki.subject_public_key.raw_bytes());
    digest[..KEY_IDENTIFIER_LEN].to_vec()
}

/// Build the extension list for `template`.
pub fn build_extensions(
    template: &CertificateTemplate,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<Extensions> {
    let mut extensions = Vec::new();

    if template.basic_constraints_valid {
        let value = BasicConstraints {
            ca: template.is_ca,
            path_len_constraint: None,
        }
        .to_der()
        .map_err(|e| encoding_error("basic constraints", e))?;
        extensions.push(extension(ID_CE_BASIC_CONSTRAINTS, true, value)?);
    }

    if !template.key_usage.is_empty() {
        let value = key_usage_bit_string(template.key_usage)?
            .to_der()
            .map_err(|e| encoding_error("key usage", e))?;
        extensions.push(extension(ID_CE_KEY_USAGE, true, value)?);
    }

    if !template.ext_key_usage.is_empty() {
        let value = ExtendedKeyUsage(template.ext_key_usage.iter().map(|u| u.oid()).collect())
            .to_der()
            .map_err(|e| encoding_error("extended key usage", e))?;
        extensions.push(extension(ID_CE_EXT_KEY_USAGE, false, value)?);
    }

    if !template.ip_addresses.is_empty() {
        let names = template
            .ip_addresses
            .iter()
            .map(|address| {
                OctetString::new(ip_address_octets(address.as_ref()))
                    .map(GeneralName::IpAddress)
                    .map_err(|e| encoding_error("IP address", e))
            })
            .collect::<Result<Vec<_>>>()?;
        let value = SubjectAltName(names)
            .to_der()
            .map_err(|e| encoding_error("subject alternative name", e))?;
        extensions.push(extension(ID_CE_SUBJECT_ALT_NAME, false, value)?);
    }

    if template.is_ca {
        let value = OctetString::new(subject_key_identifier(spki))
            .and_then(|ski| ski.to_der())
            .map_err(|e| encoding_error("subject key identifier", e))?;
        extensions.push(extension(ID_CE_SUBJECT_KEY_IDENTIFIER, false, value)?);
    }

    Ok(extensions)
}

/// Extension values read back from a certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedExtensions {
    /// `None` when the certificate has no basicConstraints extension.
    pub is_ca: Option<bool>,
    pub key_usage: KeyUsageFlags,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub ip_addresses: Vec<Option<IpAddr>>,
    pub subject_key_id: Option<Vec<u8>>,
}

fn decoding_error(what: &str, e: der::Error) -> CertCtlError {
    CertCtlError::CertificateError(format!("Failed to decode {}: {}", what, e))
}

/// Decode the extensions this crate writes. Others are skipped.
pub fn decode_extensions(extensions: Option<&Extensions>) -> Result<DecodedExtensions> {
    let mut decoded = DecodedExtensions::default();

    for ext in extensions.into_iter().flatten() {
        let value = ext.extn_value.as_bytes();
        if ext.extn_id == ID_CE_BASIC_CONSTRAINTS {
            let bc = BasicConstraints::from_der(value)
                .map_err(|e| decoding_error("basic constraints", e))?;
            decoded.is_ca = Some(bc.ca);
        } else if ext.extn_id == ID_CE_KEY_USAGE {
            let bits = BitString::from_der(value).map_err(|e| decoding_error("key usage", e))?;
            decoded.key_usage = key_usage_from_bit_string(&bits);
        } else if ext.extn_id == ID_CE_EXT_KEY_USAGE {
            let eku = ExtendedKeyUsage::from_der(value)
                .map_err(|e| decoding_error("extended key usage", e))?;
            decoded.ext_key_usage = eku.0.iter().filter_map(ExtKeyUsage::from_oid).collect();
        } else if ext.extn_id == ID_CE_SUBJECT_ALT_NAME {
            let san = SubjectAltName::from_der(value)
                .map_err(|e| decoding_error("subject alternative name", e))?;
            decoded.ip_addresses = san
                .0
                .iter()
                .filter_map(|name| match name {
                    GeneralName::IpAddress(octets) => {
                        Some(ip_address_from_octets(octets.as_bytes()))
                    }
                    _ => None,
                })
                .collect();
        } else if ext.extn_id == ID_CE_SUBJECT_KEY_IDENTIFIER {
            let ski = OctetString::from_der(value)
                .map_err(|e| decoding_error("subject key identifier", e))?;
            decoded.subject_key_id = Some(ski.as_bytes().to_vec());
        }
    }

    Ok(decoded)
}
