//! S3 side of a sync
//!
//! - [`keys`] - object key and content type mapping
//! - [`credentials`] - credential source selection and session building
//! - [`client::S3Store`] - the storage operations a sync needs
//! - [`clear::BucketClearer`] / [`upload::DirectoryUploader`] - the two bucket stages

pub mod clear;
pub mod client;
pub mod credentials;
pub mod keys;
pub mod types;
pub mod upload;

pub use clear::{BucketClearer, ClearReport};
pub use client::{ObjectStore, S3Store};
pub use credentials::{CredentialResolver, CredentialSource, ProfileCatalog, ResolvedSession};
pub use keys::map_key;
pub use types::{DistributionSummary, InvalidationHandle, MappedKey, ObjectPage, SiteFile};
pub use upload::{DirectoryUploader, UploadReport};
