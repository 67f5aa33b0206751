//! Retry configuration.
//!
//! Policies are keyed by resource kind and can be overridden from a TOML file:
//!
//! ```toml
//! [retry.acm-certificate]
//! max_attempts = 5
//! delay_secs = 10
//!
//! [retry.sagemaker-endpoint]
//! max_attempts = 2
//! delay_secs = 5
//! ```
//!
//! Kinds that are not mentioned keep their defaults: three attempts thirty
//! seconds apart for ACM certificates, a single attempt for everything else.
use std::collections::BTreeMap;

use snafu::prelude::*;

use crate::{retry::RetryPolicy, teardown::ResourceKind, ConfigParseSnafu, ConfigReadSnafu, Result};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default = "default_retry")]
    retry: BTreeMap<ResourceKind, RetryPolicy>,
}

fn default_retry() -> BTreeMap<ResourceKind, RetryPolicy> {
    BTreeMap::from([(ResourceKind::AcmCertificate, RetryPolicy::certificate())])
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry: default_retry(),
        }
    }
}

impl Config {
    /// Parses a TOML config, filling in defaults for unmentioned kinds.
    pub fn from_toml_str(contents: &str, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let parsed: Config = toml::from_str(contents).context(ConfigParseSnafu {
            path: path.as_ref().to_path_buf(),
        })?;
        let mut config = Config::default();
        config.retry.extend(parsed.retry);
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("reading config from {path:?}");
        let contents = std::fs::read_to_string(path).context(ConfigReadSnafu {
            path: path.to_path_buf(),
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// The retry policy used for resources of `kind`.
    pub fn policy(&self, kind: ResourceKind) -> RetryPolicy {
        self.retry.get(&kind).copied().unwrap_or_default()
    }

    pub fn with_policy(mut self, kind: ResourceKind, policy: RetryPolicy) -> Self {
        self.retry.insert(kind, policy);
        self
    }
}
