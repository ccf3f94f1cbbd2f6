//! Sync pipeline
//!
//! Stages run strictly in order, each one finishing before the next starts:
//!
//! ```text
//! ResolvingCredentials -> ClearingBucket -> UploadingDirectory -> InvalidatingCache -> Done
//! ```
//!
//! Any failure moves the run to `Failed` and skips the remaining stages: an
//! upload never lands on a bucket that failed to clear, and the CDN is never
//! invalidated in front of a partially uploaded site. Without a directory the
//! run ends after clearing. All remote calls race the run's cancellation token.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::cdn::{CacheInvalidator, Cdn, CloudFrontCdn};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::s3::clear::{BucketClearer, ClearReport};
use crate::s3::client::{ObjectStore, S3Store};
use crate::s3::credentials::{CredentialResolver, EnvLookup};
use crate::s3::types::InvalidationHandle;
use crate::s3::upload::{DirectoryUploader, UploadReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    ResolvingCredentials,
    ClearingBucket,
    UploadingDirectory,
    InvalidatingCache,
    Done,
    Failed,
}

impl SyncStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStage::Done | SyncStage::Failed)
    }
}

/// What a successful run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub cleared: ClearReport,
    /// `None` in clear-only mode
    pub uploaded: Option<UploadReport>,
    /// `None` unless cache invalidation was requested
    pub invalidation: Option<InvalidationHandle>,
}

/// Run `fut` unless the token is cancelled first
pub async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SyncError::Cancelled),
        result = fut => result,
    }
}

/// The stages after credential resolution, over any storage and CDN.
///
/// Starts in `ClearingBucket`; [`SyncRun`] tracks the stage before it.
pub struct SyncPipeline<'a> {
    config: &'a SyncConfig,
    region: String,
    store: &'a dyn ObjectStore,
    cdn: &'a dyn Cdn,
    cancel: CancellationToken,
    stage: SyncStage,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(
        config: &'a SyncConfig,
        region: impl Into<String>,
        store: &'a dyn ObjectStore,
        cdn: &'a dyn Cdn,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            region: region.into(),
            store,
            cdn,
            cancel,
            stage: SyncStage::ClearingBucket,
        }
    }

    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    pub async fn run(&mut self) -> Result<SyncReport> {
        match self.run_stages().await {
            Ok(report) => {
                self.enter(SyncStage::Done);
                Ok(report)
            }
            Err(err) => {
                tracing::error!(stage = ?self.stage, error = %err, "sync failed");
                self.stage = SyncStage::Failed;
                Err(err)
            }
        }
    }

    async fn run_stages(&mut self) -> Result<SyncReport> {
        let config = self.config;
        let mut report = SyncReport::default();

        let clearer = BucketClearer::new(self.store);
        report.cleared = cancellable(&self.cancel, clearer.clear(&config.bucket, config.prefix()))
            .await
            .inspect_err(|_| tracing::error!("Failed to clear bucket, aborting upload"))?;

        let Some(directory) = config.directory.as_deref() else {
            tracing::info!("No directory configured, bucket cleared only");
            return Ok(report);
        };

        self.enter(SyncStage::UploadingDirectory);
        let uploader = DirectoryUploader::new(self.store).with_concurrency(config.concurrency);
        report.uploaded = Some(
            cancellable(
                &self.cancel,
                uploader.upload(directory, &config.bucket, config.prefix()),
            )
            .await?,
        );

        if !config.invalidate_cache {
            return Ok(report);
        }

        self.enter(SyncStage::InvalidatingCache);
        let invalidator = CacheInvalidator::new(self.cdn);
        report.invalidation = Some(
            cancellable(&self.cancel, invalidator.invalidate(&config.bucket, &self.region)).await?,
        );

        Ok(report)
    }

    fn enter(&mut self, stage: SyncStage) {
        tracing::debug!(from = ?self.stage, to = ?stage, "stage transition");
        self.stage = stage;
    }
}

/// A whole run: credential resolution, then the pipeline over the AWS clients
pub struct SyncRun<'a, E: EnvLookup> {
    config: &'a SyncConfig,
    resolver: &'a CredentialResolver<E>,
    cancel: CancellationToken,
    stage: SyncStage,
}

impl<'a, E: EnvLookup> SyncRun<'a, E> {
    pub fn new(
        config: &'a SyncConfig,
        resolver: &'a CredentialResolver<E>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            resolver,
            cancel,
            stage: SyncStage::ResolvingCredentials,
        }
    }

    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    pub async fn run(&mut self) -> Result<SyncReport> {
        let config = self.config;
        let resolved = cancellable(
            &self.cancel,
            self.resolver
                .resolve(&config.credentials, &config.region, config.role.as_deref()),
        )
        .await;

        let session = match resolved {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(stage = ?self.stage, error = %err, "sync failed");
                self.stage = SyncStage::Failed;
                return Err(err);
            }
        };

        let store = S3Store::new(&session, config.endpoint_url.as_deref());
        let cdn = CloudFrontCdn::new(&session);

        let mut pipeline =
            SyncPipeline::new(config, session.region(), &store, &cdn, self.cancel.clone());
        tracing::debug!(from = ?self.stage, to = ?pipeline.stage(), "stage transition");
        let result = pipeline.run().await;
        self.stage = pipeline.stage();

        result
    }
}

/// Resolve credentials, build the AWS clients and run the whole pipeline.
pub async fn run_sync<E: EnvLookup>(
    config: &SyncConfig,
    resolver: &CredentialResolver<E>,
    cancel: CancellationToken,
) -> Result<SyncReport> {
    SyncRun::new(config, resolver, cancel).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialInputs;
    use std::collections::HashMap;

    #[test]
    fn test_terminal_stages() {
        assert!(SyncStage::Done.is_terminal());
        assert!(SyncStage::Failed.is_terminal());
        assert!(!SyncStage::ClearingBucket.is_terminal());
    }

    #[tokio::test]
    async fn test_cancellable_prefers_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let result = cancellable(&token, async { Ok(1) }).await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let token = CancellationToken::new();
        assert_eq!(cancellable(&token, async { Ok(7) }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_credential_failure_precedes_remote_calls() {
        let config = SyncConfig::new(
            None,
            Some("site".to_string()),
            None,
            None,
            CredentialInputs::new(Some("AKIA".to_string()), None, Some("dev".to_string())),
            None,
            true,
        )
        .unwrap();
        let resolver = CredentialResolver::with_env(HashMap::new());

        let mut run = SyncRun::new(&config, &resolver, CancellationToken::new());
        assert_eq!(run.stage(), SyncStage::ResolvingCredentials);

        let err = run.run().await.unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
        assert_eq!(run.stage(), SyncStage::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_before_resolution() {
        let config = SyncConfig::new(
            None,
            Some("site".to_string()),
            None,
            None,
            CredentialInputs::new(Some("AKIA".to_string()), Some("secret".to_string()), None),
            None,
            false,
        )
        .unwrap();
        let resolver = CredentialResolver::with_env(HashMap::new());
        let token = CancellationToken::new();
        token.cancel();

        let mut run = SyncRun::new(&config, &resolver, token);
        let err = run.run().await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(run.stage(), SyncStage::Failed);
    }
}
