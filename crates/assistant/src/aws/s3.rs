//! AWS S3 buckets.
use std::future::Future;

use aws_sdk_s3::{
    operation::{delete_objects::DeleteObjectsOutput, list_objects_v2::ListObjectsV2Output},
    types::{Delete, ObjectIdentifier},
};

use crate::{classify::ProviderError, teardown::Deleted};

/// Most keys a single `DeleteObjects` call accepts.
const DELETE_BATCH: usize = 1000;

/// The S3 calls needed to empty a bucket.
pub trait ObjectStore {
    /// Lists one page of the bucket's objects.
    fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> impl Future<Output = Result<ListObjectsV2Output, ProviderError>>;

    fn delete_keys(
        &self,
        bucket: &str,
        keys: &[&str],
    ) -> impl Future<Output = Result<DeleteObjectsOutput, ProviderError>>;
}

impl ObjectStore for aws_sdk_s3::Client {
    async fn list_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> Result<ListObjectsV2Output, ProviderError> {
        self.list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(ProviderError::from_sdk)
    }

    async fn delete_keys(
        &self,
        bucket: &str,
        keys: &[&str],
    ) -> Result<DeleteObjectsOutput, ProviderError> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(*key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProviderError::local(e.to_string()))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| ProviderError::local(e.to_string()))?;
        self.delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(ProviderError::from_sdk)
    }
}

/// Deletes every object in the bucket, leaving the bucket itself in place.
pub async fn empty_bucket(
    store: &impl ObjectStore,
    bucket: &str,
) -> Result<Deleted, ProviderError> {
    let mut deleted = 0;
    let mut continuation_token = None;
    loop {
        let out = store.list_page(bucket, continuation_token.take()).await?;
        let keys = out
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .collect::<Vec<_>>();
        for batch in keys.chunks(DELETE_BATCH) {
            deleted += delete_batch(store, bucket, batch).await?;
        }

        if out.is_truncated() == Some(true) {
            continuation_token = out.next_continuation_token().map(str::to_owned);
        } else {
            break;
        }
    }
    Ok(Deleted::Count(deleted))
}

async fn delete_batch(
    store: &impl ObjectStore,
    bucket: &str,
    keys: &[&str],
) -> Result<usize, ProviderError> {
    log::debug!("deleting {} objects from {bucket}", keys.len());
    let out = store.delete_keys(bucket, keys).await?;
    if let Some(error) = out.errors().first() {
        return Err(ProviderError::new(
            error.code(),
            error.message(),
            format!(
                "could not delete {} of {} objects from {bucket}, first was '{}'",
                out.errors().len(),
                keys.len(),
                error.key().unwrap_or_default()
            ),
        ));
    }
    Ok(keys.len())
}
