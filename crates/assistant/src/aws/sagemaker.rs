//! AWS SageMaker models and endpoints.
use crate::{classify::ProviderError, teardown::Deleted};

pub async fn delete_model(
    client: &aws_sdk_sagemaker::Client,
    name: &str,
) -> Result<Deleted, ProviderError> {
    client
        .delete_model()
        .model_name(name)
        .send()
        .await
        .map_err(ProviderError::from_sdk)?;
    Ok(Deleted::Identifier(name.to_owned()))
}

pub async fn delete_endpoint_config(
    client: &aws_sdk_sagemaker::Client,
    name: &str,
) -> Result<Deleted, ProviderError> {
    client
        .delete_endpoint_config()
        .endpoint_config_name(name)
        .send()
        .await
        .map_err(ProviderError::from_sdk)?;
    Ok(Deleted::Identifier(name.to_owned()))
}

pub async fn delete_endpoint(
    client: &aws_sdk_sagemaker::Client,
    name: &str,
) -> Result<Deleted, ProviderError> {
    client
        .delete_endpoint()
        .endpoint_name(name)
        .send()
        .await
        .map_err(ProviderError::from_sdk)?;
    Ok(Deleted::Identifier(name.to_owned()))
}
