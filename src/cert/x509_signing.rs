//! X.509 certificate signing using x509-cert.
//!
//! A certificate binds a public key to a template's subject and is signed by
//! a parent's private key under the parent's identity. For a self-signed
//! root the template is its own parent.

use crate::cert::extensions::{build_extensions, check_ip_address_lengths};
use crate::cert::template::{CertificateTemplate, SubjectName};
use crate::error::{CertCtlError, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use der::asn1::{AnyRef, BitString, GeneralizedTime, SetOfVec, UtcTime, Utf8StringRef};
use der::{Decode, Encode};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::io::Write;
use tracing::debug;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::certificate::{Certificate, Version};
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::TbsCertificate;

/// PEM label of an X.509 certificate.
pub const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// A signed certificate together with its encodings.
#[derive(Debug, Clone)]
pub struct SignedCertificate {
    pub certificate: Certificate,
    pub der: Vec<u8>,
    pub pem: String,
}

/// Sign `template` with `parent_key` under `parent`'s identity.
///
/// The DER output is parsed back before it is accepted, then PEM-encoded
/// into `sink`. The parse rejects iPAddress SAN entries that are neither 4
/// nor 16 octets long, so a template holding a `None` address fails here
/// and nothing reaches `sink`. Any failure on the way is a
/// [`CertCtlError::SigningError`].
///
/// # Example
///
/// ```rust,no_run
/// use certctl::cert::template::{apply_root_usages, build_template};
/// use certctl::cert::x509_signing::sign_certificate;
/// use certctl::config::IssuerConfig;
/// use certctl::crypto::keygen::create_rsa_key_pair;
/// use rand::rngs::OsRng;
///
/// # fn example() -> certctl::error::Result<()> {
/// let keypair = create_rsa_key_pair(&mut OsRng, 2048, &mut std::io::sink())?;
/// let mut template = build_template(&mut OsRng, true, vec![], &IssuerConfig::default())?;
/// apply_root_usages(&mut template);
///
/// let mut pem = Vec::new();
/// let signed = sign_certificate(&template, &template, &keypair.public, &keypair.private, &mut pem)?;
/// assert_eq!(signed.certificate.tbs_certificate.issuer, signed.certificate.tbs_certificate.subject);
/// # Ok(())
/// # }
/// ```
pub fn sign_certificate<W>(
    template: &CertificateTemplate,
    parent: &CertificateTemplate,
    public_key: &RsaPublicKey,
    parent_key: &RsaPrivateKey,
    sink: &mut W,
) -> Result<SignedCertificate>
where
    W: Write + ?Sized,
{
    let serial_number = SerialNumber::new(&template.serial_number.to_be_bytes())
        .map_err(|e| CertCtlError::SigningError(format!("Invalid serial number: {}", e)))?;
    let subject = create_rdn_sequence(&template.subject)?;
    let issuer = create_rdn_sequence(&parent.subject)?;
    let validity = create_validity(template.not_before, template.not_after)?;
    let spki = create_subject_public_key_info(public_key)?;
    let extensions = build_extensions(template, &spki)?;
    let signature_algorithm = sha256_with_rsa_algorithm();

    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number,
        signature: signature_algorithm.clone(),
        issuer,
        validity,
        subject,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: if extensions.is_empty() {
            None
        } else {
            Some(extensions)
        },
    };

    // Signed with the parent's key, which is the subject's own key for a root
    let signature = sign_tbs(&tbs, parent_key)?;

    let cert = Certificate {
        tbs_certificate: tbs,
        signature_algorithm,
        signature,
    };

    let der = cert
        .to_der()
        .map_err(|e| CertCtlError::SigningError(format!("Failed to encode certificate: {}", e)))?;
    let certificate = Certificate::from_der(&der).map_err(|e| {
        CertCtlError::SigningError(format!("Signed certificate does not parse back: {}", e))
    })?;
    check_ip_address_lengths(certificate.tbs_certificate.extensions.as_ref())?;

    let pem = crate::encode_pem(CERTIFICATE_TAG, der.clone());
    sink.write_all(pem.as_bytes()).map_err(|e| {
        CertCtlError::SigningError(format!("Failed to write certificate PEM: {}", e))
    })?;

    debug!(
        subject = %certificate.tbs_certificate.subject,
        issuer = %certificate.tbs_certificate.issuer,
        der_len = der.len(),
        "signed certificate"
    );

    Ok(SignedCertificate {
        certificate,
        der,
        pem,
    })
}

/// sha256WithRSAEncryption with the NULL parameters RFC 4055 requires.
pub fn sha256_with_rsa_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
        parameters: Some(AnyRef::NULL.into()),
    }
}

// Helper functions

fn create_rdn_sequence(subject: &SubjectName) -> Result<RdnSequence> {
    let mut rdns = Vec::new();

    for organization in &subject.organizations {
        rdns.push(single_attribute_rdn(
            const_oid::db::rfc4519::O,
            organization,
        )?);
    }

    Ok(RdnSequence(rdns))
}

fn single_attribute_rdn(
    oid: const_oid::ObjectIdentifier,
    value: &str,
) -> Result<RelativeDistinguishedName> {
    let attr = AttributeTypeAndValue {
        oid,
        value: Utf8StringRef::new(value)
            .map_err(|e| CertCtlError::SigningError(format!("Invalid name value: {}", e)))?
            .into(),
    };

    let mut attr_set = SetOfVec::new();
    attr_set
        .insert_ordered(attr)
        .map_err(|e| CertCtlError::SigningError(format!("Failed to add attribute: {}", e)))?;

    Ok(RelativeDistinguishedName::from(attr_set))
}

/// UTCTime through 2049, GeneralizedTime afterwards (RFC 5280 §4.1.2.5).
fn to_x509_time(at: DateTime<Utc>) -> Result<Time> {
    let invalid = |e: der::Error| CertCtlError::SigningError(format!("Invalid time {}: {}", at, e));

    let year = u16::try_from(at.year())
        .map_err(|_| CertCtlError::SigningError(format!("Year out of range: {}", at)))?;
    let date_time = der::DateTime::new(
        year,
        at.month() as u8,
        at.day() as u8,
        at.hour() as u8,
        at.minute() as u8,
        at.second() as u8,
    )
    .map_err(invalid)?;

    if (1950..2050).contains(&year) {
        Ok(Time::UtcTime(
            UtcTime::from_date_time(date_time).map_err(invalid)?,
        ))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

fn create_validity(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Result<Validity> {
    if not_after <= not_before {
        return Err(CertCtlError::SigningError(
            "NotAfter must be later than NotBefore".to_string(),
        ));
    }

    Ok(Validity {
        not_before: to_x509_time(not_before)?,
        not_after: to_x509_time(not_after)?,
    })
}

fn create_subject_public_key_info(public_key: &RsaPublicKey) -> Result<SubjectPublicKeyInfoOwned> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| CertCtlError::SigningError(format!("Failed to encode public key: {}", e)))?;

    SubjectPublicKeyInfoOwned::from_der(der.as_bytes())
        .map_err(|e| CertCtlError::SigningError(format!("Invalid public key info: {}", e)))
}

fn sign_tbs(tbs: &TbsCertificate, private_key: &RsaPrivateKey) -> Result<BitString> {
    let tbs_der = tbs
        .to_der()
        .map_err(|e| CertCtlError::SigningError(format!("Failed to encode TBS: {}", e)))?;

    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key
        .try_sign(&tbs_der)
        .map_err(|e| CertCtlError::SigningError(format!("RSA signing failed: {}", e)))?;

    BitString::from_bytes(&signature.to_vec()).map_err(|e| {
        CertCtlError::SigningError(format!("Failed to create signature bitstring: {}", e))
    })
}
