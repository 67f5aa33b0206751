//! # CloudFormation assistants
//!
//! Small custom-resource handlers that clean up after a CloudFormation stack,
//! built around one contract: _idempotent external-resource teardown with
//! bounded retry_.
//!
//! ## Concepts
//!
//! - A [`TeardownRequest`] names one resource by [`ResourceKind`] and
//!   identifier.
//! - [`ResourceTeardown`] makes a single deletion attempt through a
//!   [`TeardownProvider`] and classifies the result. A resource that is
//!   already gone counts as deleted. A resource that is in use is _busy_.
//!   Every other provider error is fatal.
//! - [`BoundedRetryExecutor`] retries busy attempts according to a
//!   [`RetryPolicy`] and settles each request into exactly one
//!   [`Success`] or [`TeardownError`].
//!
//! The [`aws`] module provides the provider for S3, ECR, SageMaker and ACM.
//! The [`handlers`] module wires that provider into the custom resources
//! themselves, and [`custom_resource`] models the events they receive.
//!
//! ## Error Handling
//!
//! Everything that can go wrong outside of a teardown is collected in the
//! [`Error`] enum. Teardown failures are wrapped in [`Error::Teardown`] so the
//! underlying [`TeardownError`] stays available to callers.
use snafu::prelude::*;

pub mod aws;
pub mod certificate;
pub mod classify;
pub mod config;
pub mod custom_resource;
pub mod handlers;
pub mod retry;
pub mod strings;
pub mod teardown;
#[cfg(test)]
mod test;
pub mod utils;

pub use classify::{ErrorClass, ProviderError};
pub use config::Config;
pub use retry::{BoundedRetryExecutor, RetryPolicy, Settled, Success, TeardownError};
pub use teardown::{
    Deleted, ResourceKind, ResourceTeardown, TeardownOutcome, TeardownProvider, TeardownRequest,
};

/// Top-level error enum that encompasses all errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{source}"))]
    Teardown { source: TeardownError },

    #[snafu(display("Unknown resource kind '{name}'"))]
    UnknownKind { name: String },

    #[snafu(display("A retry policy needs at least one attempt, got {max_attempts}"))]
    InvalidPolicy { max_attempts: u32 },

    #[snafu(display("Missing resource property '{name}'"))]
    MissingProperty { name: String },

    #[snafu(display("Resource property '{name}' has an invalid value {value}: {reason}"))]
    InvalidProperty {
        name: String,
        value: String,
        reason: String,
    },

    #[snafu(display("Unsupported function '{function}'"))]
    UnsupportedFunction { function: String },

    #[snafu(display("Could not generate a self-signed certificate: {source}"))]
    CertificateGenerate { source: rcgen::Error },

    #[snafu(display("Could not import certificate into ACM: {source}"))]
    CertificateImport { source: ProviderError },

    #[snafu(display("Could not read config file {path:?}: {source}"))]
    ConfigRead {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not parse config file {path:?}: {source}"))]
    ConfigParse {
        path: std::path::PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("Could not deserialize custom resource event: {source}"))]
    Event { source: serde_json::Error },

    #[snafu(display(
        "{request_type} of '{logical_resource_id}' did not finish within {}s",
        budget.as_secs()
    ))]
    DeadlineExceeded {
        request_type: custom_resource::RequestType,
        logical_resource_id: String,
        budget: std::time::Duration,
    },
}

impl From<TeardownError> for Error {
    fn from(source: TeardownError) -> Self {
        Error::Teardown { source }
    }
}

type Result<T, E = Error> = core::result::Result<T, E>;
