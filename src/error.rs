//! Error taxonomy for a sync run
//!
//! Every fatal condition ends the run with one of these variants. The binary
//! prints the message and exits with [`SyncError::exit_code`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or contradictory inputs, detected before any remote call.
    #[error("{0}")]
    Configuration(String),

    /// A storage, CDN or STS call failed.
    #[error("{operation} failed: {message}")]
    Remote {
        operation: &'static str,
        message: String,
    },

    /// No CDN distribution has the bucket as its first origin.
    #[error("distribution for bucket {bucket} not found")]
    DistributionNotFound { bucket: String },

    /// A saved profile with the same name already exists for this directory.
    #[error("profile {name} already exists for {}", directory.display())]
    DuplicateProfile { name: String, directory: PathBuf },

    /// Reading the local site directory failed.
    #[error("cannot read {}: {source}", path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The saved-profile document could not be read or written.
    #[error("profile store {}: {message}", path.display())]
    ProfileStore { path: PathBuf, message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn config(message: impl Into<String>) -> Self {
        SyncError::Configuration(message.into())
    }

    /// Wrap an SDK error, keeping its full cause chain in the message.
    pub fn remote<E>(operation: &'static str, err: E) -> Self
    where
        E: std::error::Error,
    {
        SyncError::Remote {
            operation,
            message: aws_sdk_s3::error::DisplayErrorContext(err).to_string(),
        }
    }

    /// Process exit status for this error.
    ///
    /// - 1: remote, local file and profile store failures
    /// - 2: configuration problems, including duplicate profiles
    /// - 130: cancelled (Ctrl-C)
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Configuration(_) | SyncError::DuplicateProfile { .. } => 2,
            SyncError::Cancelled => 130,
            _ => 1,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Extract the exit code from an `anyhow::Error`, defaulting to 1.
pub fn exit_code_from_error(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<SyncError>()
        .map(SyncError::exit_code)
        .unwrap_or(1)
}
