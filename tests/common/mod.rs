//! In-memory stand-ins for the bucket and the CDN
//!
//! Both record every call into one shared event log so tests can assert the
//! order in which the pipeline touches them.

#![allow(dead_code)]

use async_trait::async_trait;
use s3_site_sync::cdn::Cdn;
use s3_site_sync::s3::client::{ObjectStore, MAX_KEYS_PER_PAGE};
use s3_site_sync::s3::types::{DistributionSummary, InvalidationHandle, ObjectPage};
use s3_site_sync::{Result, SyncError};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type EventLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Bucket held in a sorted map, listed in pages of 1000 keys
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<BTreeMap<String, StoredObject>>,
    pub events: EventLog,
    pub fail_delete: bool,
    pub fail_put_key: Option<String>,
}

impl MemoryStore {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn seed(&self, keys: impl IntoIterator<Item = String>) {
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.insert(
                key,
                StoredObject {
                    content_type: None,
                    body: b"old".to_vec(),
                },
            );
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        _bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage> {
        self.record(format!("list:{}", continuation_token.unwrap_or("-")));

        let objects = self.objects.lock().unwrap();
        let mut matching = objects
            .keys()
            .filter(|k| prefix.map_or(true, |p| k.starts_with(p)))
            .filter(|k| continuation_token.map_or(true, |t| k.as_str() > t))
            .cloned();

        let keys: Vec<String> = matching.by_ref().take(MAX_KEYS_PER_PAGE as usize).collect();
        let next_token = match matching.next() {
            Some(_) => keys.last().cloned(),
            None => None,
        };

        Ok(ObjectPage { keys, next_token })
    }

    async fn delete_batch(&self, _bucket: &str, keys: &[String]) -> Result<()> {
        self.record(format!("delete:{}", keys.len()));
        if self.fail_delete {
            return Err(SyncError::Remote {
                operation: "DeleteObjects",
                message: "AccessDenied".to_string(),
            });
        }

        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn put_file(
        &self,
        _bucket: &str,
        key: &str,
        content_type: Option<&str>,
        path: &Path,
    ) -> Result<()> {
        self.record(format!("put:{}", key));
        if self.fail_put_key.as_deref() == Some(key) {
            return Err(SyncError::Remote {
                operation: "PutObject",
                message: "InternalError".to_string(),
            });
        }

        let body = std::fs::read(path).map_err(|source| SyncError::LocalFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.map(str::to_string),
                body,
            },
        );
        Ok(())
    }
}

/// CDN with fixed distributions
pub struct FakeCdn {
    pub distributions: Vec<DistributionSummary>,
    pub events: EventLog,
    pub fail_invalidation: bool,
}

impl FakeCdn {
    pub fn new(events: EventLog, distributions: &[(&str, &str)]) -> Self {
        Self {
            distributions: distributions
                .iter()
                .map(|(id, origin)| DistributionSummary {
                    id: id.to_string(),
                    origin_domains: vec![origin.to_string()],
                })
                .collect(),
            events,
            fail_invalidation: false,
        }
    }
}

#[async_trait]
impl Cdn for FakeCdn {
    async fn list_distributions(&self) -> Result<Vec<DistributionSummary>> {
        self.events.lock().unwrap().push("cdn:list".to_string());
        Ok(self.distributions.clone())
    }

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        caller_reference: &str,
        paths: &[&str],
    ) -> Result<InvalidationHandle> {
        self.events
            .lock()
            .unwrap()
            .push(format!("cdn:invalidate:{}:{}", distribution_id, paths.join(",")));
        if self.fail_invalidation {
            return Err(SyncError::Remote {
                operation: "CreateInvalidation",
                message: "TooManyInvalidationsInProgress".to_string(),
            });
        }

        Ok(InvalidationHandle {
            distribution_id: distribution_id.to_string(),
            invalidation_id: "I2J0IHWXYZ".to_string(),
            status: "InProgress".to_string(),
            caller_reference: caller_reference.to_string(),
        })
    }
}

pub fn events() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}
