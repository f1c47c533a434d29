//! A device-resident backend that keeps filter values in a JSON file, one file per storage key.
use crate::{
    error::FilterSyncError as Error,
    store::{apply_patch, Bucket, FilterStore, Patch},
};
use log::{debug, warn};
use pathbuf::pathbuf;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Filter values persisted to `{dir}/{storage_key}.json`.
///
/// The file is read once when the store is opened and rewritten after every patch.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalStore {
    path: PathBuf,
    bucket: Bucket,
}

impl LocalStore {
    /// Open the store for a storage key in an existing directory.
    ///
    /// A missing file is an empty store. A file that is not a JSON object is also treated as empty, because it
    /// may have been corrupted or written by something else.
    pub fn open(dir: &Path, storage_key: &str) -> Result<Self, Error> {
        if !dir.is_dir() {
            return Err(Error::PathNotFound(dir.to_string_lossy().to_string()));
        }
        let path = pathbuf![dir, &format!("{}.json", storage_key)];

        let bucket = if path.exists() {
            let data = fs::read_to_string(&path).map_err(|e| Error::IoError(format!("{e}")))?;
            match serde_json::from_str::<Value>(&data) {
                Ok(Value::Object(map)) => map.into_iter().collect(),
                Ok(_) | Err(_) => {
                    warn!(
                        "Local filter store {} does not hold a JSON object and will be ignored.",
                        path.to_string_lossy()
                    );
                    Bucket::new()
                }
            }
        } else {
            Bucket::new()
        };

        Ok(Self { path, bucket })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self) -> Result<(), Error> {
        let contents = serde_json::to_string_pretty(&self.bucket)
            .map_err(|e| Error::SerializationError(e.to_string()))?;
        fs::write(&self.path, contents).map_err(|e| Error::IoError(e.to_string()))?;
        debug!("Wrote local filter store {}", self.path.to_string_lossy());
        Ok(())
    }
}

impl FilterStore for LocalStore {
    fn snapshot(&self) -> Bucket {
        self.bucket.clone()
    }

    fn patch(&mut self, patch: Patch) -> Result<(), Error> {
        let mut bucket = self.bucket.clone();
        apply_patch(&mut bucket, patch);
        if bucket == self.bucket {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.bucket, bucket);
        if let Err(e) = self.write() {
            // Keep memory and disk in agreement when the write fails
            self.bucket = previous;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{error::FilterSyncError as Error, store::local::*};
    use serde_json::json;
    use test_log::test;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        let dir = pathbuf![&std::env::temp_dir(), &format!("filter-sync-{}", Uuid::new_v4())];
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn values_survive_reopening() {
        let dir = scratch_dir();

        let mut store = LocalStore::open(&dir, "users-table").unwrap();
        assert!(store.snapshot().is_empty());
        store
            .patch(Patch::from([
                ("status".to_string(), Some(json!("active"))),
                ("price".to_string(), Some(json!([1, 2]))),
            ]))
            .unwrap();
        store.remove(&["price"]).unwrap();

        let reopened = LocalStore::open(&dir, "users-table").unwrap();
        assert_eq!(
            reopened.snapshot(),
            Bucket::from([("status".to_string(), json!("active"))])
        );

        // Clean up
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn malformed_file_is_an_empty_store() {
        let dir = scratch_dir();
        fs::write(pathbuf![&dir, "broken.json"], "[1, 2").unwrap();

        let store = LocalStore::open(&dir, "broken").unwrap();
        assert!(store.snapshot().is_empty());

        // Clean up
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory() {
        let dir = pathbuf![&std::env::temp_dir(), &format!("missing-{}", Uuid::new_v4())];

        assert!(matches!(
            LocalStore::open(&dir, "any"),
            Err(Error::PathNotFound(_))
        ));
    }

    #[test]
    fn failed_write_propagates_and_rolls_back() {
        let dir = scratch_dir();
        let mut store = LocalStore::open(&dir, "gone").unwrap();
        fs::remove_dir_all(&dir).unwrap();

        let result = store.patch(Patch::from([("a".to_string(), Some(json!(1)))]));
        assert!(matches!(result, Err(Error::IoError(_))));
        assert!(store.snapshot().is_empty());
    }
}
