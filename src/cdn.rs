//! CloudFront cache invalidation
//!
//! The distribution serving a bucket is found by comparing each
//! distribution's first origin with the bucket's regional S3 endpoint host.
//! Only the first origin is inspected.

use async_trait::async_trait;
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_cloudfront::Client;

use crate::error::{Result, SyncError};
use crate::s3::credentials::ResolvedSession;
use crate::s3::types::{DistributionSummary, InvalidationHandle};

/// Path pattern covering every cached object
pub const INVALIDATE_ALL: &str = "/*";

/// The CDN operations needed for invalidation
#[async_trait]
pub trait Cdn: Send + Sync {
    /// All distributions visible to the session, origins in configured order
    async fn list_distributions(&self) -> Result<Vec<DistributionSummary>>;

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        caller_reference: &str,
        paths: &[&str],
    ) -> Result<InvalidationHandle>;
}

/// Origin host CloudFront uses for a bucket: `{bucket}.s3.{region}.amazonaws.com`
pub fn expected_origin_domain(bucket: &str, region: &str) -> String {
    format!("{}.s3.{}.amazonaws.com", bucket, region)
}

/// Caller reference for an invalidation, from the current Unix time in seconds.
///
/// Two invalidations in the same second share a reference.
pub fn caller_reference_now() -> String {
    chrono::Utc::now().timestamp().to_string()
}

pub struct CacheInvalidator<'a> {
    cdn: &'a dyn Cdn,
}

impl<'a> CacheInvalidator<'a> {
    pub fn new(cdn: &'a dyn Cdn) -> Self {
        Self { cdn }
    }

    /// Find the distribution whose first origin is the bucket
    pub async fn find_distribution(&self, bucket: &str, region: &str) -> Result<String> {
        let expected = expected_origin_domain(bucket, region);

        self.cdn
            .list_distributions()
            .await?
            .into_iter()
            .find(|d| d.first_origin() == Some(expected.as_str()))
            .map(|d| d.id)
            .ok_or_else(|| SyncError::DistributionNotFound {
                bucket: bucket.to_string(),
            })
    }

    /// Submit a `/*` invalidation for the bucket's distribution. Does not
    /// wait for CloudFront to finish.
    pub async fn invalidate(&self, bucket: &str, region: &str) -> Result<InvalidationHandle> {
        let distribution_id = self.find_distribution(bucket, region).await?;
        tracing::info!("Creating CloudFront invalidation for {}", distribution_id);

        let handle = self
            .cdn
            .create_invalidation(&distribution_id, &caller_reference_now(), &[INVALIDATE_ALL])
            .await?;

        tracing::info!(
            distribution = %handle.distribution_id,
            invalidation = %handle.invalidation_id,
            status = %handle.status,
            "invalidation submitted"
        );

        Ok(handle)
    }
}

/// [`Cdn`] backed by the CloudFront SDK
#[derive(Clone)]
pub struct CloudFrontCdn {
    client: Client,
}

impl CloudFrontCdn {
    pub fn new(session: &ResolvedSession) -> Self {
        Self {
            client: Client::new(session.config()),
        }
    }
}

#[async_trait]
impl Cdn for CloudFrontCdn {
    async fn list_distributions(&self) -> Result<Vec<DistributionSummary>> {
        let mut distributions = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_distributions()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| SyncError::remote("ListDistributions", e))?;

            let Some(list) = response.distribution_list() else {
                break;
            };

            for summary in list.items() {
                let origin_domains = summary
                    .origins()
                    .map(|origins| {
                        origins
                            .items()
                            .iter()
                            .map(|o| o.domain_name().to_string())
                            .collect()
                    })
                    .unwrap_or_default();

                distributions.push(DistributionSummary {
                    id: summary.id().to_string(),
                    origin_domains,
                });
            }

            match list.next_marker() {
                Some(next) if list.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(distributions)
    }

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        caller_reference: &str,
        paths: &[&str],
    ) -> Result<InvalidationHandle> {
        let paths = Paths::builder()
            .quantity(paths.len() as i32)
            .set_items(Some(paths.iter().map(|p| p.to_string()).collect()))
            .build()
            .map_err(|e| SyncError::remote("CreateInvalidation", e))?;

        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(caller_reference)
            .build()
            .map_err(|e| SyncError::remote("CreateInvalidation", e))?;

        let response = self
            .client
            .create_invalidation()
            .distribution_id(distribution_id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(|e| SyncError::remote("CreateInvalidation", e))?;

        let (invalidation_id, status) = response
            .invalidation()
            .map(|i| (i.id().to_string(), i.status().to_string()))
            .unwrap_or_default();

        Ok(InvalidationHandle {
            distribution_id: distribution_id.to_string(),
            invalidation_id,
            status,
            caller_reference: caller_reference.to_string(),
        })
    }
}
