//! The AWS teardown provider.
pub use aws_config::SdkConfig;

pub mod acm;
pub mod ecr;
pub mod s3;
pub mod sagemaker;

use crate::{
    certificate::SelfSignedCertificate,
    classify::ProviderError,
    handlers::CertificateImporter,
    teardown::{Deleted, ResourceKind, TeardownProvider, TeardownRequest},
};

/// Service clients built from one shared `SdkConfig`.
pub struct Aws {
    config: SdkConfig,
    acm: aws_sdk_acm::Client,
    ecr: aws_sdk_ecr::Client,
    s3: aws_sdk_s3::Client,
    sagemaker: aws_sdk_sagemaker::Client,
}

impl AsRef<SdkConfig> for Aws {
    fn as_ref(&self) -> &SdkConfig {
        &self.config
    }
}

impl From<SdkConfig> for Aws {
    fn from(config: SdkConfig) -> Self {
        Self::new(config)
    }
}

impl Aws {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            acm: aws_sdk_acm::Client::new(&config),
            ecr: aws_sdk_ecr::Client::new(&config),
            s3: aws_sdk_s3::Client::new(&config),
            sagemaker: aws_sdk_sagemaker::Client::new(&config),
            config,
        }
    }

    /// Loads configuration from the environment, as the Lambda runtime provides it.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(config)
    }
}

impl TeardownProvider for Aws {
    async fn delete(&self, request: &TeardownRequest) -> Result<Option<Deleted>, ProviderError> {
        let id = request.identifier();
        match request.kind() {
            ResourceKind::Bucket => s3::empty_bucket(&self.s3, id).await.map(Some),
            ResourceKind::EcrRepository => ecr::delete_images(&self.ecr, id).await,
            ResourceKind::SageMakerModel => {
                sagemaker::delete_model(&self.sagemaker, id).await.map(Some)
            }
            ResourceKind::SageMakerEndpoint => {
                sagemaker::delete_endpoint(&self.sagemaker, id).await.map(Some)
            }
            ResourceKind::SageMakerEndpointConfig => {
                sagemaker::delete_endpoint_config(&self.sagemaker, id)
                    .await
                    .map(Some)
            }
            ResourceKind::AcmCertificate => {
                acm::delete_certificate(&self.acm, id).await.map(Some)
            }
        }
    }
}

impl CertificateImporter for Aws {
    async fn import_certificate(
        &self,
        certificate: &SelfSignedCertificate,
    ) -> Result<String, ProviderError> {
        acm::import_certificate(&self.acm, certificate).await
    }
}
