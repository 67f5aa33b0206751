//! CloudFormation custom resource events.
//!
//! Handlers receive the event CloudFormation sends to a custom resource's
//! service token and answer with the physical resource id and any output
//! data. Signalling the result back to CloudFormation is left to the provider
//! framework that invokes the handler.
use std::{future::Future, time::Duration};

use serde_json::{Map, Value};
use snafu::prelude::*;

use crate::{
    strings, utils, DeadlineExceededSnafu, EventSnafu, InvalidPropertySnafu, MissingPropertySnafu,
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl core::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RequestType::Create => "create",
            RequestType::Update => "update",
            RequestType::Delete => "delete",
        })
    }
}

/// A custom resource lifecycle event.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceEvent {
    pub request_type: RequestType,
    pub request_id: String,
    pub stack_id: String,
    pub logical_resource_id: String,
    pub resource_type: String,
    /// Absent on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: Map<String, Value>,
    /// Present on update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<Map<String, Value>>,
    #[serde(default, rename = "ResponseURL", skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,
}

impl CustomResourceEvent {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).context(EventSnafu)
    }

    /// Returns a string property, failing if it is missing.
    ///
    /// Numbers and booleans are rendered as strings, since CloudFormation
    /// passes every scalar property as a string anyway.
    pub fn property(&self, name: &str) -> Result<String> {
        self.optional_property(name)?.context(MissingPropertySnafu { name })
    }

    /// Returns a string property, or `None` if it is missing or null.
    pub fn optional_property(&self, name: &str) -> Result<Option<String>> {
        match self.resource_properties.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => InvalidPropertySnafu {
                name,
                value: other.to_string(),
                reason: "expected a string",
            }
            .fail(),
        }
    }

    /// Parses a property with [`FromStr`](std::str::FromStr).
    pub fn parsed_property<T>(&self, name: &str) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: core::fmt::Display,
    {
        let value = self.property(name)?;
        value.trim().parse().map_err(|e: T::Err| crate::Error::InvalidProperty {
            name: name.to_owned(),
            value: format!("{value:?}"),
            reason: e.to_string(),
        })
    }

    /// Physical id assigned when a create handler doesn't choose one.
    fn generated_physical_resource_id(&self) -> String {
        format!(
            "{}-{}-{}",
            utils::stack_name(&self.stack_id),
            self.logical_resource_id,
            strings::random_string(8)
        )
    }
}

/// What a handler reports back for an event.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl CustomResourceResponse {
    pub fn with_physical_resource_id(mut self, id: impl Into<String>) -> Self {
        self.physical_resource_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// A custom resource handler.
///
/// Each method has a default implementation that does nothing, so a handler
/// only implements the lifecycle events it cares about.
pub trait CustomResource {
    fn create(
        &self,
        _event: &CustomResourceEvent,
    ) -> impl Future<Output = Result<CustomResourceResponse>> {
        async { Ok(CustomResourceResponse::default()) }
    }

    fn update(
        &self,
        _event: &CustomResourceEvent,
    ) -> impl Future<Output = Result<CustomResourceResponse>> {
        async { Ok(CustomResourceResponse::default()) }
    }

    fn delete(
        &self,
        _event: &CustomResourceEvent,
    ) -> impl Future<Output = Result<CustomResourceResponse>> {
        async { Ok(CustomResourceResponse::default()) }
    }
}

/// Routes `event` to the handler method for its request type.
///
/// Fills in the physical resource id when the handler leaves it empty: a
/// generated id on create, the event's current id on update and delete.
pub async fn dispatch<H: CustomResource>(
    handler: &H,
    event: &CustomResourceEvent,
) -> Result<CustomResourceResponse> {
    log::info!(
        "{} '{}' ({})",
        event.request_type,
        event.logical_resource_id,
        event.resource_type
    );
    let mut response = match event.request_type {
        RequestType::Create => handler.create(event).await?,
        RequestType::Update => handler.update(event).await?,
        RequestType::Delete => handler.delete(event).await?,
    };
    if response.physical_resource_id.is_none() {
        let id = match (event.request_type, &event.physical_resource_id) {
            (RequestType::Update | RequestType::Delete, Some(id)) => id.clone(),
            _ => event.generated_physical_resource_id(),
        };
        response.physical_resource_id = Some(id);
    }
    log::info!("  success!");
    Ok(response)
}

/// Like [`dispatch`], but gives up once `budget` has elapsed.
///
/// Used to fail an invocation before its runtime kills it, so the failure can
/// still be reported.
pub async fn dispatch_within<H: CustomResource>(
    handler: &H,
    event: &CustomResourceEvent,
    budget: Duration,
) -> Result<CustomResourceResponse> {
    tokio::time::timeout(budget, dispatch(handler, event))
        .await
        .ok()
        .context(DeadlineExceededSnafu {
            request_type: event.request_type,
            logical_resource_id: event.logical_resource_id.clone(),
            budget,
        })?
}
