//! Self-signed certificate generation.
use rand::Rng;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SerialNumber};
use snafu::prelude::*;

use crate::{utils, CertificateGenerateSnafu, Result};

/// Subject and validity of a generated certificate.
///
/// The subject doubles as the issuer, since the certificate signs itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSubject {
    pub country: String,
    pub state_or_province: String,
    pub locality: String,
    pub organization: String,
    pub common_name: String,
    pub dns_names: Vec<String>,
    pub validity_days: i64,
}

impl Default for CertificateSubject {
    fn default() -> Self {
        Self {
            country: "US".to_owned(),
            state_or_province: "California".to_owned(),
            locality: "San Francisco".to_owned(),
            organization: "My Company".to_owned(),
            common_name: "example.com".to_owned(),
            dns_names: vec!["localhost".to_owned()],
            validity_days: 365,
        }
    }
}

/// PEM encoded certificate and private key.
#[derive(Clone)]
pub struct SelfSignedCertificate {
    pub certificate_pem: String,
    pub private_key_pem: String,
    /// Uppercase hex sha256 of the DER encoded certificate.
    pub fingerprint: String,
}

impl core::fmt::Debug for SelfSignedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfSignedCertificate")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Generates a fresh key pair and a certificate signed by it.
pub fn generate(subject: &CertificateSubject) -> Result<SelfSignedCertificate> {
    let mut params =
        CertificateParams::new(subject.dns_names.clone()).context(CertificateGenerateSnafu)?;

    let mut name = DistinguishedName::new();
    name.push(DnType::CountryName, subject.country.as_str());
    name.push(DnType::StateOrProvinceName, subject.state_or_province.as_str());
    name.push(DnType::LocalityName, subject.locality.as_str());
    name.push(DnType::OrganizationName, subject.organization.as_str());
    name.push(DnType::CommonName, subject.common_name.as_str());
    params.distinguished_name = name;

    let now = time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + time::Duration::days(subject.validity_days);

    let mut serial: [u8; 16] = rand::thread_rng().gen();
    // keep the serial positive and free of a leading zero octet
    serial[0] = (serial[0] & 0x7f) | 0x40;
    params.serial_number = Some(SerialNumber::from_slice(&serial));

    let key_pair = KeyPair::generate().context(CertificateGenerateSnafu)?;
    let certificate = params
        .self_signed(&key_pair)
        .context(CertificateGenerateSnafu)?;
    let fingerprint = utils::sha256_digest(certificate.der());
    log::debug!("generated certificate for '{}' {fingerprint}", subject.common_name);

    Ok(SelfSignedCertificate {
        certificate_pem: certificate.pem(),
        private_key_pem: key_pair.serialize_pem(),
        fingerprint,
    })
}
