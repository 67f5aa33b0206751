//! Idempotent teardown of a single external resource.
//!
//! A [`ResourceTeardown`] performs one deletion attempt through a
//! [`TeardownProvider`] and reduces whatever happened to a
//! [`TeardownOutcome`]. Retrying is the job of
//! [`BoundedRetryExecutor`](crate::retry::BoundedRetryExecutor).
use std::future::Future;

use crate::classify::{classify, ErrorClass, ProviderError};

/// Kinds of resources the assistants know how to tear down.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// An S3 bucket whose objects are deleted. The bucket itself is left in place.
    Bucket,
    /// An ECR repository whose images are deleted.
    EcrRepository,
    #[serde(rename = "sagemaker-model")]
    SageMakerModel,
    #[serde(rename = "sagemaker-endpoint")]
    SageMakerEndpoint,
    #[serde(rename = "sagemaker-endpoint-config")]
    SageMakerEndpointConfig,
    AcmCertificate,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Bucket,
        ResourceKind::EcrRepository,
        ResourceKind::SageMakerModel,
        ResourceKind::SageMakerEndpoint,
        ResourceKind::SageMakerEndpointConfig,
        ResourceKind::AcmCertificate,
    ];

    /// Stable kebab-case name, as used in config files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Bucket => "bucket",
            ResourceKind::EcrRepository => "ecr-repository",
            ResourceKind::SageMakerModel => "sagemaker-model",
            ResourceKind::SageMakerEndpoint => "sagemaker-endpoint",
            ResourceKind::SageMakerEndpointConfig => "sagemaker-endpoint-config",
            ResourceKind::AcmCertificate => "acm-certificate",
        }
    }

    /// Human readable noun used in log messages.
    pub fn noun(&self) -> &'static str {
        match self {
            ResourceKind::Bucket => "bucket",
            ResourceKind::EcrRepository => "repository",
            ResourceKind::SageMakerModel => "model",
            ResourceKind::SageMakerEndpoint => "endpoint",
            ResourceKind::SageMakerEndpointConfig => "endpoint configuration",
            ResourceKind::AcmCertificate => "certificate",
        }
    }

    /// What a [`Deleted::Count`] counts for this kind.
    fn member_noun(&self) -> &'static str {
        match self {
            ResourceKind::Bucket => "objects",
            ResourceKind::EcrRepository => "images",
            _ => "items",
        }
    }
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownKind { name: s.to_owned() })
    }
}

/// A request to tear down one named resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownRequest {
    kind: ResourceKind,
    identifier: String,
}

impl core::fmt::Display for TeardownRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.kind.noun(), self.identifier)
    }
}

impl TeardownRequest {
    pub fn new(kind: ResourceKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Name or ARN of the resource.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// What a successful deletion removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deleted {
    /// Number of member items removed (bucket objects, repository images).
    Count(usize),
    /// The resource itself was removed.
    Identifier(String),
}

/// Result of a single teardown attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TeardownOutcome {
    Deleted(Deleted),
    /// The resource does not exist, or holds nothing to delete.
    AlreadyAbsent,
    /// The resource is in use. Expected to clear with time.
    Busy(String),
    /// Any other provider failure. Never retried.
    Fatal(ProviderError),
}

/// A platform that can delete the resources named by a [`TeardownRequest`].
pub trait TeardownProvider {
    /// Deletes the resource, or its contents for container kinds.
    ///
    /// Returns `Ok(None)` when the resource exists but there is nothing in it
    /// to delete, in which case no deletion call should have been made.
    fn delete(
        &self,
        request: &TeardownRequest,
    ) -> impl Future<Output = Result<Option<Deleted>, ProviderError>>;
}

impl<T: TeardownProvider> TeardownProvider for &T {
    fn delete(
        &self,
        request: &TeardownRequest,
    ) -> impl Future<Output = Result<Option<Deleted>, ProviderError>> {
        (**self).delete(request)
    }
}

/// Performs single, classified teardown attempts.
pub struct ResourceTeardown<P> {
    provider: P,
}

impl<P: TeardownProvider> ResourceTeardown<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Attempts to delete the requested resource once.
    pub async fn attempt(&self, request: &TeardownRequest) -> TeardownOutcome {
        let kind = request.kind();
        let id = request.identifier();
        match self.provider.delete(request).await {
            Ok(Some(Deleted::Count(n))) => {
                log::info!(
                    "Successfully deleted {n} {} from {} called '{id}'.",
                    kind.member_noun(),
                    kind.noun()
                );
                TeardownOutcome::Deleted(Deleted::Count(n))
            }
            Ok(Some(deleted)) => {
                log::info!("Successfully deleted {} called '{id}'.", kind.noun());
                TeardownOutcome::Deleted(deleted)
            }
            Ok(None) => {
                log::info!(
                    "Could not find any {} in {} called '{id}'. Skipping delete.",
                    kind.member_noun(),
                    kind.noun()
                );
                TeardownOutcome::AlreadyAbsent
            }
            Err(error) => match classify(kind, &error) {
                ErrorClass::NotFound => {
                    log::info!(
                        "Could not find {} called '{id}'. Skipping delete.",
                        kind.noun()
                    );
                    TeardownOutcome::AlreadyAbsent
                }
                ErrorClass::Busy => {
                    log::warn!(
                        "Could not delete {} called '{id}' because it's currently in use.",
                        kind.noun()
                    );
                    TeardownOutcome::Busy(error.message.unwrap_or(error.detail))
                }
                ErrorClass::Other => {
                    log::error!("Could not delete {request}: {error}");
                    TeardownOutcome::Fatal(error)
                }
            },
        }
    }
}
