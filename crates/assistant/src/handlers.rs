//! The custom resources.
//!
//! | handler | create / update | delete |
//! |---|---|---|
//! | [`BucketAssistant`] | nothing | empties `S3Bucket` |
//! | [`SolutionAssistant`] | nothing | empties `ECRRepository`, deletes the `SageMakerModel` model, endpoint config and endpoint |
//! | [`StringFunctions`] | computes `OutputString` | nothing |
//! | [`CertificateIssuer`] | imports a fresh self-signed certificate | nothing |
//! | [`CertificateCleanup`] | nothing | deletes `CertificateArn`, retrying while in use |
use std::future::Future;

use snafu::prelude::*;

use crate::{
    certificate::{self, CertificateSubject, SelfSignedCertificate},
    classify::ProviderError,
    config::Config,
    custom_resource::{CustomResource, CustomResourceEvent, CustomResourceResponse},
    retry::{BoundedRetryExecutor, Success},
    strings::{StringFunction, MAX_RANDOM_LENGTH},
    teardown::{ResourceKind, TeardownProvider, TeardownRequest},
    CertificateImportSnafu, InvalidPropertySnafu, Result, UnsupportedFunctionSnafu,
};

/// A platform that can store certificates.
pub trait CertificateImporter {
    /// Imports the certificate, returning its ARN.
    fn import_certificate(
        &self,
        certificate: &SelfSignedCertificate,
    ) -> impl Future<Output = Result<String, ProviderError>>;
}

impl<T: CertificateImporter> CertificateImporter for &T {
    fn import_certificate(
        &self,
        certificate: &SelfSignedCertificate,
    ) -> impl Future<Output = Result<String, ProviderError>> {
        (**self).import_certificate(certificate)
    }
}

/// Runs teardowns with the retry policy configured for each resource kind.
pub struct Teardowns<P> {
    executor: BoundedRetryExecutor<P>,
    config: Config,
}

impl<P: TeardownProvider> Teardowns<P> {
    pub fn new(provider: P, config: Config) -> Self {
        Self {
            executor: BoundedRetryExecutor::new(provider),
            config,
        }
    }

    pub fn provider(&self) -> &P {
        self.executor.teardown().provider()
    }

    pub async fn tear_down(&self, kind: ResourceKind, identifier: &str) -> Result<Success> {
        let request = TeardownRequest::new(kind, identifier);
        let policy = self.config.policy(kind);
        Ok(self.executor.run(&request, &policy).await?)
    }
}

/// Empties a bucket so CloudFormation can delete it.
pub struct BucketAssistant<P> {
    teardowns: Teardowns<P>,
}

impl<P: TeardownProvider> BucketAssistant<P> {
    pub fn new(teardowns: Teardowns<P>) -> Self {
        Self { teardowns }
    }
}

impl<P: TeardownProvider> CustomResource for BucketAssistant<P> {
    async fn delete(&self, event: &CustomResourceEvent) -> Result<CustomResourceResponse> {
        match event.optional_property("S3Bucket")? {
            Some(bucket) if !bucket.is_empty() => {
                self.teardowns
                    .tear_down(ResourceKind::Bucket, &bucket)
                    .await?;
            }
            _ => log::info!("no bucket given, nothing to empty"),
        }
        Ok(CustomResourceResponse::default())
    }
}

/// Removes what a deployed solution leaves behind outside of CloudFormation.
pub struct SolutionAssistant<P> {
    teardowns: Teardowns<P>,
}

impl<P: TeardownProvider> SolutionAssistant<P> {
    pub fn new(teardowns: Teardowns<P>) -> Self {
        Self { teardowns }
    }
}

impl<P: TeardownProvider> CustomResource for SolutionAssistant<P> {
    async fn delete(&self, event: &CustomResourceEvent) -> Result<CustomResourceResponse> {
        let repository = event.property("ECRRepository")?;
        let model = event.property("SageMakerModel")?;

        self.teardowns
            .tear_down(ResourceKind::EcrRepository, &repository)
            .await?;
        // model, endpoint config and endpoint all share the model's name
        for kind in [
            ResourceKind::SageMakerModel,
            ResourceKind::SageMakerEndpointConfig,
            ResourceKind::SageMakerEndpoint,
        ] {
            self.teardowns.tear_down(kind, &model).await?;
        }
        Ok(CustomResourceResponse::default())
    }
}

/// Small string helpers for templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringFunctions;

impl StringFunctions {
    fn function(event: &CustomResourceEvent) -> Result<StringFunction> {
        let function = event.property("Function")?;
        match function.as_str() {
            "random" => {
                let length: usize = event.parsed_property("Length")?;
                ensure!(
                    length <= MAX_RANDOM_LENGTH,
                    InvalidPropertySnafu {
                        name: "Length",
                        value: length.to_string(),
                        reason: format!("must be at most {MAX_RANDOM_LENGTH}"),
                    }
                );
                Ok(StringFunction::Random { length })
            }
            "lower" => Ok(StringFunction::Lower {
                input: event.property("InputString")?,
            }),
            _ => UnsupportedFunctionSnafu { function }.fail(),
        }
    }

    fn respond(event: &CustomResourceEvent) -> Result<CustomResourceResponse> {
        let output = Self::function(event)?.apply();
        Ok(CustomResourceResponse::default().with_data("OutputString", output))
    }
}

impl CustomResource for StringFunctions {
    async fn create(&self, event: &CustomResourceEvent) -> Result<CustomResourceResponse> {
        Self::respond(event)
    }

    async fn update(&self, event: &CustomResourceEvent) -> Result<CustomResourceResponse> {
        Self::respond(event)
    }
}

/// Issues a self-signed certificate into ACM.
///
/// The certificate's ARN becomes the physical resource id. Deletion is the
/// job of a separate [`CertificateCleanup`] resource, which can wait for the
/// certificate to be released by its users.
pub struct CertificateIssuer<P> {
    importer: P,
    subject: CertificateSubject,
}

impl<P: CertificateImporter> CertificateIssuer<P> {
    pub fn new(importer: P) -> Self {
        Self {
            importer,
            subject: CertificateSubject::default(),
        }
    }

    pub fn with_subject(mut self, subject: CertificateSubject) -> Self {
        self.subject = subject;
        self
    }
}

impl<P: CertificateImporter> CustomResource for CertificateIssuer<P> {
    async fn create(&self, _event: &CustomResourceEvent) -> Result<CustomResourceResponse> {
        let certificate = certificate::generate(&self.subject)?;
        let arn = self
            .importer
            .import_certificate(&certificate)
            .await
            .context(CertificateImportSnafu)?;
        Ok(CustomResourceResponse::default()
            .with_physical_resource_id(arn.as_str())
            .with_data("CertificateArn", arn)
            .with_data("Fingerprint", certificate.fingerprint))
    }
}

/// Deletes an ACM certificate once nothing uses it anymore.
pub struct CertificateCleanup<P> {
    teardowns: Teardowns<P>,
}

impl<P: TeardownProvider> CertificateCleanup<P> {
    pub fn new(teardowns: Teardowns<P>) -> Self {
        Self { teardowns }
    }
}

impl<P: TeardownProvider> CustomResource for CertificateCleanup<P> {
    async fn delete(&self, event: &CustomResourceEvent) -> Result<CustomResourceResponse> {
        let arn = event.property("CertificateArn")?;
        self.teardowns
            .tear_down(ResourceKind::AcmCertificate, &arn)
            .await?;
        Ok(CustomResourceResponse::default())
    }
}
