//! Remove every object under a prefix, one DeleteObjects call per listed page

use crate::error::Result;
use crate::s3::client::ObjectStore;
use crate::s3::keys::listing_prefix;

/// Outcome of a successful clear
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub pages: usize,
    pub delete_batches: usize,
    pub removed: usize,
}

pub struct BucketClearer<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> BucketClearer<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Delete all objects in `bucket`, scoped to `prefix/` when `prefix` is non-empty.
    ///
    /// The first listing or deletion error stops the walk. Pages already
    /// deleted stay deleted.
    pub async fn clear(&self, bucket: &str, prefix: &str) -> Result<ClearReport> {
        let prefix = listing_prefix(prefix);
        let mut report = ClearReport::default();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .store
                .list_page(bucket, prefix.as_deref(), token.as_deref())
                .await?;
            report.pages += 1;

            for key in &page.keys {
                tracing::info!("> removing object {}", key);
            }

            // An empty Delete request is rejected by S3
            if !page.keys.is_empty() {
                self.store.delete_batch(bucket, &page.keys).await?;
                report.delete_batches += 1;
                report.removed += page.keys.len();
            }

            if page.is_last() {
                break;
            }
            token = page.next_token;
        }

        tracing::debug!(
            pages = report.pages,
            batches = report.delete_batches,
            removed = report.removed,
            "bucket cleared"
        );

        Ok(report)
    }
}
