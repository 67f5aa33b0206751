//! Provider error classification.
//!
//! Each [`ResourceKind`] has a table of provider error codes that mean the
//! resource is gone or is still in use. Codes come from the service's error
//! metadata, not from the rendered error text. SageMaker reports a missing
//! model, endpoint or endpoint configuration as a plain `ValidationException`,
//! so those rows also carry the documented message prefix.
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::teardown::ResourceKind;

/// Structured metadata of a failed provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Service error code, eg `NoSuchBucket`.
    pub code: Option<String>,
    /// Service error message.
    pub message: Option<String>,
    /// Full rendering of the error chain.
    pub detail: String,
}

impl core::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code.as_deref() {
            Some(code) => write!(f, "{code}: {}", self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn new(code: Option<&str>, message: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_owned),
            message: message.map(str::to_owned),
            detail: detail.into(),
        }
    }

    /// An error raised on our side of the call, which carries no service code.
    pub fn local(detail: impl Into<String>) -> Self {
        Self::new(None, None, detail)
    }

    /// Captures code, message and the full error chain of any AWS SDK error.
    pub fn from_sdk<E, R>(error: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: core::fmt::Debug,
    {
        Self::new(
            error.code(),
            error.message(),
            DisplayErrorContext(&error).to_string(),
        )
    }
}

/// How a provider error affects a teardown attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The resource does not exist.
    NotFound,
    /// The resource is in use and may be deletable later.
    Busy,
    /// Anything else.
    Other,
}

struct Rule {
    code: &'static str,
    message_contains: Option<&'static str>,
    class: ErrorClass,
}

impl Rule {
    const fn code(code: &'static str, class: ErrorClass) -> Self {
        Rule {
            code,
            message_contains: None,
            class,
        }
    }

    const fn code_and_message(
        code: &'static str,
        message: &'static str,
        class: ErrorClass,
    ) -> Self {
        Rule {
            code,
            message_contains: Some(message),
            class,
        }
    }

    fn matches(&self, code: &str, message: &str) -> bool {
        self.code == code
            && self
                .message_contains
                .map(|needle| message.contains(needle))
                .unwrap_or(true)
    }
}

const BUCKET_RULES: &[Rule] = &[Rule::code("NoSuchBucket", ErrorClass::NotFound)];

const ECR_REPOSITORY_RULES: &[Rule] = &[Rule::code(
    "RepositoryNotFoundException",
    ErrorClass::NotFound,
)];

const SAGEMAKER_MODEL_RULES: &[Rule] = &[Rule::code_and_message(
    "ValidationException",
    "Could not find model",
    ErrorClass::NotFound,
)];

const SAGEMAKER_ENDPOINT_RULES: &[Rule] = &[Rule::code_and_message(
    "ValidationException",
    "Could not find endpoint",
    ErrorClass::NotFound,
)];

const SAGEMAKER_ENDPOINT_CONFIG_RULES: &[Rule] = &[Rule::code_and_message(
    "ValidationException",
    "Could not find endpoint configuration",
    ErrorClass::NotFound,
)];

const ACM_CERTIFICATE_RULES: &[Rule] = &[
    Rule::code("ResourceNotFoundException", ErrorClass::NotFound),
    Rule::code("ResourceInUseException", ErrorClass::Busy),
];

fn rules(kind: ResourceKind) -> &'static [Rule] {
    match kind {
        ResourceKind::Bucket => BUCKET_RULES,
        ResourceKind::EcrRepository => ECR_REPOSITORY_RULES,
        ResourceKind::SageMakerModel => SAGEMAKER_MODEL_RULES,
        ResourceKind::SageMakerEndpoint => SAGEMAKER_ENDPOINT_RULES,
        ResourceKind::SageMakerEndpointConfig => SAGEMAKER_ENDPOINT_CONFIG_RULES,
        ResourceKind::AcmCertificate => ACM_CERTIFICATE_RULES,
    }
}

/// Classifies a provider error raised while deleting a resource of `kind`.
///
/// Errors without a service code are always [`ErrorClass::Other`].
pub fn classify(kind: ResourceKind, error: &ProviderError) -> ErrorClass {
    let Some(code) = error.code.as_deref() else {
        return ErrorClass::Other;
    };
    let message = error.message.as_deref().unwrap_or_default();
    rules(kind)
        .iter()
        .find(|rule| rule.matches(code, message))
        .map(|rule| rule.class)
        .unwrap_or(ErrorClass::Other)
}
