//! The persistence backends filter values are reconciled with.
//!
//! Every backend exposes the same small contract: a snapshot of its flat key/value map, a merging patch, and
//! key removal. The engine reads one snapshot per pass and writes at most one patch per backend.

pub mod address;
pub mod codec;
pub mod local;

use crate::{error::FilterSyncError as Error, filter::PersistenceTarget};
use serde_json::Value;
use std::collections::BTreeMap;

/// A flat key/value snapshot of one backend
pub type Bucket = BTreeMap<String, Value>;

/// A partial update of a backend. A `None` value removes the key.
pub type Patch = BTreeMap<String, Option<Value>>;

/// A key/value persistence backend for filter values
pub trait FilterStore {
    /// Current contents of the backend
    fn snapshot(&self) -> Bucket;

    /// Merge a patch into the backend
    fn patch(&mut self, patch: Patch) -> Result<(), Error>;

    /// Remove one or more keys
    fn remove(&mut self, keys: &[&str]) -> Result<(), Error> {
        let patch = keys.iter().map(|key| (key.to_string(), None)).collect();
        self.patch(patch)
    }
}

/// Merge a patch into a bucket
pub fn apply_patch(bucket: &mut Bucket, patch: Patch) {
    for (key, value) in patch {
        match value {
            Some(value) => {
                bucket.insert(key, value);
            }
            None => {
                bucket.remove(&key);
            }
        }
    }
}

/// Snapshots of both backends, taken once at the start of a pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Buckets {
    pub url: Bucket,
    pub local: Bucket,
}

impl Buckets {
    pub fn bucket(&self, target: PersistenceTarget) -> &Bucket {
        match target {
            PersistenceTarget::Url => &self.url,
            PersistenceTarget::Local => &self.local,
        }
    }

    /// The raw value stored for a key in the given backend
    pub fn get(&self, target: PersistenceTarget, key: &str) -> Option<&Value> {
        self.bucket(target).get(key)
    }
}

/// Pending writes for both backends, built by a pass before anything is written
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BucketPatches {
    pub url: Patch,
    pub local: Patch,
}

impl BucketPatches {
    pub fn patch_mut(&mut self, target: PersistenceTarget) -> &mut Patch {
        match target {
            PersistenceTarget::Url => &mut self.url,
            PersistenceTarget::Local => &mut self.local,
        }
    }

    /// Queue a write of `value` (or a removal, for `None`) to a key of one backend
    pub fn set(&mut self, target: PersistenceTarget, key: &str, value: Option<Value>) {
        self.patch_mut(target).insert(key.to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty() && self.local.is_empty()
    }
}

/// An in-memory backend.
///
/// Every applied patch is recorded, which lets hosts (and tests) observe exactly what the engine wrote.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStore {
    bucket: Bucket,
    history: Vec<Patch>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds some values
    pub fn with_values<I: IntoIterator<Item = (String, Value)>>(values: I) -> Self {
        Self {
            bucket: values.into_iter().collect(),
            history: Vec::new(),
        }
    }

    /// Every patch applied so far, oldest first
    pub fn patches(&self) -> &[Patch] {
        &self.history
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.bucket.get(key)
    }
}

impl FilterStore for MemoryStore {
    fn snapshot(&self) -> Bucket {
        self.bucket.clone()
    }

    fn patch(&mut self, patch: Patch) -> Result<(), Error> {
        self.history.push(patch.clone());
        apply_patch(&mut self.bucket, patch);
        Ok(())
    }
}
