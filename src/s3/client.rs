//! AWS S3 client wrapper

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use std::path::Path;

use crate::error::{Result, SyncError};
use crate::s3::credentials::ResolvedSession;
use crate::s3::types::ObjectPage;

/// Upper bound of keys in one list page or one DeleteObjects request
pub const MAX_KEYS_PER_PAGE: i32 = 1000;

/// The storage operations the sync pipeline needs
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of keys under `prefix`, continuing from `continuation_token`
    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage>;

    /// Delete the given keys in one request. `keys` is never empty.
    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> Result<()>;

    /// Upload the file at `path` as `key`
    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        path: &Path,
    ) -> Result<()>;
}

/// [`ObjectStore`] backed by the AWS SDK
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Create a client from the run's session.
    ///
    /// With `endpoint_url` set the client talks to an S3-compatible service
    /// using path-style addressing.
    pub fn new(session: &ResolvedSession, endpoint_url: Option<&str>) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(session.config());
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(MAX_KEYS_PER_PAGE)
            .set_prefix(prefix.map(str::to_string))
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| SyncError::remote("ListObjectsV2", e))?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage { keys, next_token })
    }

    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> Result<()> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SyncError::remote("DeleteObjects", e))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| SyncError::remote("DeleteObjects", e))?;

        let response = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| SyncError::remote("DeleteObjects", e))?;

        // Per-key failures come back in a successful response
        if let Some(failure) = response.errors().first() {
            return Err(SyncError::Remote {
                operation: "DeleteObjects",
                message: format!(
                    "{} of {} keys not deleted, first: {} ({}: {})",
                    response.errors().len(),
                    keys.len(),
                    failure.key().unwrap_or("unknown"),
                    failure.code().unwrap_or("unknown"),
                    failure.message().unwrap_or("no message"),
                ),
            });
        }

        Ok(())
    }

    async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        path: &Path,
    ) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| SyncError::LocalFile {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::remote("PutObject", e))?;

        Ok(())
    }
}
