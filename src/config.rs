//! Validated configuration for one sync run

use std::path::PathBuf;

use crate::error::{Result, SyncError};

/// Region used when neither the flags nor a loaded AWS profile name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Raw credential inputs as supplied by the user.
///
/// Which of these wins is decided by the credential resolver; contradictory
/// combinations are rejected there, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialInputs {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub profile: Option<String>,
}

impl CredentialInputs {
    pub fn new(
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        profile: Option<String>,
    ) -> Self {
        Self {
            access_key_id: non_empty(access_key_id),
            secret_access_key: non_empty(secret_access_key),
            profile: non_empty(profile),
        }
    }
}

/// Everything a run needs. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub region: String,
    pub bucket: String,
    pub prefix: Option<String>,
    /// Local site directory; `None` means clear-only mode.
    pub directory: Option<PathBuf>,
    pub credentials: CredentialInputs,
    pub role: Option<String>,
    pub invalidate_cache: bool,
    /// Custom S3-compatible endpoint (path-style addressing is forced).
    pub endpoint_url: Option<String>,
    /// Number of files uploaded at once; 1 uploads strictly in sequence.
    pub concurrency: usize,
}

impl SyncConfig {
    /// Validate and normalise the inputs.
    ///
    /// Empty strings count as absent. A missing bucket is fatal.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        region: Option<String>,
        bucket: Option<String>,
        prefix: Option<String>,
        directory: Option<PathBuf>,
        credentials: CredentialInputs,
        role: Option<String>,
        invalidate_cache: bool,
    ) -> Result<Self> {
        let bucket = non_empty(bucket).ok_or_else(|| SyncError::config("bucket is required"))?;
        let prefix = non_empty(prefix.map(|p| p.trim_matches('/').to_string()));
        let directory = directory.filter(|d| !d.as_os_str().is_empty());

        Ok(Self {
            region: non_empty(region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket,
            prefix,
            directory,
            credentials,
            role: non_empty(role),
            invalidate_cache,
            endpoint_url: None,
            concurrency: 1,
        })
    }

    pub fn with_endpoint_url(mut self, endpoint_url: Option<String>) -> Self {
        self.endpoint_url = non_empty(endpoint_url);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(SyncError::config("concurrency must be at least 1"));
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or_default()
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
