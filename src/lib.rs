//! Static site sync for S3
//!
//! Empties a bucket (or a prefix inside it), uploads a local site directory
//! with web-friendly object keys and content types, and optionally invalidates
//! the CloudFront distribution in front of the bucket.
//!
//! The remote operations sit behind the [`s3::client::ObjectStore`] and
//! [`cdn::Cdn`] traits so the pipeline can run against in-memory fakes.

pub mod cdn;
pub mod cli;
pub mod config;
pub mod error;
pub mod s3;
pub mod settings;
pub mod sync;

pub use config::{CredentialInputs, SyncConfig};
pub use error::{Result, SyncError};
pub use sync::{run_sync, SyncPipeline, SyncReport, SyncRun, SyncStage};
