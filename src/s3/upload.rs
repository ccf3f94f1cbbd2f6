//! Upload a local site directory
//!
//! Traversal ([`site_files`]) only yields files; [`DirectoryUploader`]
//! consumes that sequence and issues one PutObject per file.

use futures::stream::{self, TryStreamExt};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::s3::client::ObjectStore;
use crate::s3::keys::map_key;
use crate::s3::types::SiteFile;

/// Lazily walk `base` and yield every regular file below it.
///
/// Symlinks are followed; order is unspecified. Directories yield nothing.
pub fn site_files(base: &Path) -> impl Iterator<Item = Result<SiteFile>> + '_ {
    WalkDir::new(base)
        .follow_links(true)
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => {
                SiteFile::new(base, entry.into_path()).map(Ok)
            }
            Ok(_) => None,
            Err(err) => {
                let path = err.path().unwrap_or(base).to_path_buf();
                Some(Err(SyncError::LocalFile {
                    path,
                    source: err.into(),
                }))
            }
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: usize,
}

pub struct DirectoryUploader<'a> {
    store: &'a dyn ObjectStore,
    concurrency: usize,
}

impl<'a> DirectoryUploader<'a> {
    /// Sequential uploader: each file completes before the next starts
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            concurrency: 1,
        }
    }

    /// Upload up to `concurrency` files at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Upload every file under `base` to `bucket`, keys prefixed by `prefix`.
    ///
    /// Stops at the first failure; files uploaded before it stay in the bucket.
    pub async fn upload(&self, base: &Path, bucket: &str, prefix: &str) -> Result<UploadReport> {
        if !base.is_dir() {
            return Err(SyncError::LocalFile {
                path: base.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let uploaded = AtomicUsize::new(0);
        let counter = &uploaded;

        stream::iter(site_files(base))
            .try_for_each_concurrent(self.concurrency, move |file| async move {
                self.upload_file(&file, bucket, prefix).await?;
                counter.fetch_add(1, Ordering::Relaxed);
                Ok::<_, SyncError>(())
            })
            .await?;

        Ok(UploadReport {
            uploaded: uploaded.into_inner(),
        })
    }

    async fn upload_file(&self, file: &SiteFile, bucket: &str, prefix: &str) -> Result<()> {
        let mapped = map_key(&file.relative, prefix);
        tracing::info!("> uploading {} - {}", mapped.key, mapped.content_type_str());

        self.store
            .put_file(bucket, &mapped.key, mapped.content_type.as_deref(), &file.path)
            .await
    }
}
