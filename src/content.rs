//! Locates the raw MIME for a `Received` notification.
//!
//! SES either publishes the message inline in the notification or drops it in
//! an S3 bucket and only tells us where.

use crate::error::{ContentError, Result, TransportError};
use crate::notification::Receipt;
use async_trait::async_trait;
use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Read-only access to stored mail objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// Object store backed by a directory tree laid out as `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root_dir: PathBuf,
}

impl LocalObjectStore {
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        // Keys come from the notification; never let them walk out of the root.
        let parent_dir = |s: &str| s.split('/').any(|part| part == "..");
        if bucket.is_empty() || bucket == ".." || bucket.contains('/') || key.starts_with('/') || parent_dir(key) {
            return Err(ContentError::InvalidObjectKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
            .into());
        }
        Ok(self.root_dir.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let not_found = || ContentError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };
        let path = self.object_path(bucket, key)?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(not_found().into()),
            Err(e) => Err(TransportError::Io(e).into()),
        }
    }
}

/// Returns the bucket and key a receipt's action points at. Missing parts come
/// back empty.
pub fn object_location(receipt: Option<&Receipt>) -> (String, String) {
    let Some(action) = receipt.and_then(|r| r.action.as_ref()) else {
        return (String::new(), String::new());
    };

    let key = if action.object_key_prefix.is_empty() {
        action.object_key.clone()
    } else {
        format!("{}/{}", action.object_key_prefix, action.object_key)
    };
    (action.bucket_name.clone(), key)
}

pub struct ContentResolver {
    store: Arc<dyn ObjectStore>,
    timeout: Duration,
}

impl ContentResolver {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn resolve(&self, receipt: Option<&Receipt>, inline_content: &str) -> Result<Vec<u8>> {
        if !inline_content.is_empty() {
            debug!("Using inline content ({} bytes)", inline_content.len());
            return Ok(inline_content.as_bytes().to_vec());
        }

        let (bucket, key) = object_location(receipt);
        if bucket.is_empty() || key.is_empty() {
            return Err(ContentError::MissingLocation.into());
        }

        debug!("Fetching content from s3://{}/{}", bucket, key);
        tokio::time::timeout(self.timeout, self.store.fetch(&bucket, &key))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStore {
        objects: HashMap<(String, String), Vec<u8>>,
        pub fetches: Mutex<Vec<(String, String)>>,
    }

    impl MemoryStore {
        pub fn with(mut self, bucket: &str, key: &str, body: &[u8]) -> Self {
            self.objects
                .insert((bucket.to_string(), key.to_string()), body.to_vec());
            self
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
            let id = (bucket.to_string(), key.to_string());
            self.fetches.lock().unwrap().push(id.clone());
            self.objects.get(&id).cloned().ok_or_else(|| {
                ContentError::ObjectNotFound {
                    bucket: id.0,
                    key: id.1,
                }
                .into()
            })
        }
    }

    /// Never answers.
    pub struct StalledStore;

    #[async_trait]
    impl ObjectStore for StalledStore {
        async fn fetch(&self, _bucket: &str, _key: &str) -> Result<Vec<u8>> {
            std::future::pending().await
        }
    }
}
