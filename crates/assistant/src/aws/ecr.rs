//! AWS ECR repositories.
use std::future::Future;

use aws_sdk_ecr::{
    operation::batch_delete_image::BatchDeleteImageOutput,
    types::{ImageFailure, ImageFailureCode, ImageIdentifier},
};

use crate::{classify::ProviderError, teardown::Deleted};

/// Most image ids a single `BatchDeleteImage` call accepts.
const DELETE_BATCH: usize = 100;

/// The ECR calls needed to empty a repository.
pub trait ImageStore {
    /// Digests of every image in the repository.
    fn image_digests(
        &self,
        repository: &str,
    ) -> impl Future<Output = Result<Vec<String>, ProviderError>>;

    fn batch_delete(
        &self,
        repository: &str,
        digests: &[String],
    ) -> impl Future<Output = Result<BatchDeleteImageOutput, ProviderError>>;
}

impl ImageStore for aws_sdk_ecr::Client {
    async fn image_digests(&self, repository: &str) -> Result<Vec<String>, ProviderError> {
        let mut digests = vec![];
        let mut next_token = None;
        loop {
            let out = self
                .describe_images()
                .repository_name(repository)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(ProviderError::from_sdk)?;
            digests.extend(
                out.image_details()
                    .iter()
                    .filter_map(|detail| detail.image_digest().map(str::to_owned)),
            );
            match out.next_token() {
                Some(token) => next_token = Some(token.to_owned()),
                None => break,
            }
        }
        Ok(digests)
    }

    async fn batch_delete(
        &self,
        repository: &str,
        digests: &[String],
    ) -> Result<BatchDeleteImageOutput, ProviderError> {
        let image_ids = digests
            .iter()
            .map(|digest| ImageIdentifier::builder().image_digest(digest).build())
            .collect::<Vec<_>>();
        self.batch_delete_image()
            .repository_name(repository)
            .set_image_ids(Some(image_ids))
            .send()
            .await
            .map_err(ProviderError::from_sdk)
    }
}

/// Returns the first failure that is not `ImageNotFound`.
///
/// An image that vanished in the meantime is as good as deleted.
fn fatal_failure(repository: &str, failures: &[ImageFailure]) -> Option<ProviderError> {
    let failure = failures
        .iter()
        .find(|f| f.failure_code() != Some(&ImageFailureCode::ImageNotFound))?;
    Some(ProviderError::new(
        failure.failure_code().map(|code| code.as_str()),
        failure.failure_reason(),
        format!(
            "could not delete image from repository {repository}: {}",
            failure.failure_reason().unwrap_or("unknown reason")
        ),
    ))
}

/// Deletes every image in the repository.
///
/// Returns `Ok(None)` without deleting anything when the repository is empty.
/// Otherwise the count is the number of images ECR reports as deleted.
pub async fn delete_images(
    store: &impl ImageStore,
    repository: &str,
) -> Result<Option<Deleted>, ProviderError> {
    let digests = store.image_digests(repository).await?;
    log::debug!("found {} images in {repository}", digests.len());
    if digests.is_empty() {
        return Ok(None);
    }

    let mut deleted = 0;
    for batch in digests.chunks(DELETE_BATCH) {
        let out = store.batch_delete(repository, batch).await?;
        if let Some(error) = fatal_failure(repository, out.failures()) {
            return Err(error);
        }
        deleted += out.image_ids().len();
    }
    Ok(Some(Deleted::Count(deleted)))
}
