//! AWS certificate manager.
use aws_sdk_acm::primitives::Blob;

use crate::{certificate::SelfSignedCertificate, classify::ProviderError, teardown::Deleted};

pub async fn delete_certificate(
    client: &aws_sdk_acm::Client,
    arn: &str,
) -> Result<Deleted, ProviderError> {
    client
        .delete_certificate()
        .certificate_arn(arn)
        .send()
        .await
        .map_err(ProviderError::from_sdk)?;
    Ok(Deleted::Identifier(arn.to_owned()))
}

/// Imports a certificate and its private key, returning the new certificate's ARN.
pub async fn import_certificate(
    client: &aws_sdk_acm::Client,
    certificate: &SelfSignedCertificate,
) -> Result<String, ProviderError> {
    let out = client
        .import_certificate()
        .certificate(Blob::new(certificate.certificate_pem.as_bytes()))
        .private_key(Blob::new(certificate.private_key_pem.as_bytes()))
        .send()
        .await
        .map_err(ProviderError::from_sdk)?;
    let arn = out
        .certificate_arn
        .ok_or_else(|| ProviderError::local("missing output certificate ARN"))?;
    log::info!("...imported certificate {arn}");
    Ok(arn)
}
