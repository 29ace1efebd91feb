// THEORY:
// The `RegionStore` is durable storage for the marked regions. It mirrors a
// browser's key/value local storage: the whole region array is serialised as
// JSON under one named key, and restored verbatim. There is no per-region
// persistence and no schema versioning.
//
// Each key maps to `<dir>/<key>.json`.

use crate::core_modules::region::Region;
use crate::error::StoreError;
use log::{debug, info};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORE_KEY: &str = "parkingSpaces";

#[derive(Debug, Clone)]
pub struct RegionStore {
    dir: PathBuf,
    key: String,
}

impl RegionStore {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    /// Overwrites the stored array with `regions`.
    pub fn save(&self, regions: &[Region]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path();
        let json = serde_json::to_string(regions)?;
        fs::write(&path, json).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        info!("saved {} parking spaces to {}", regions.len(), path.display());
        Ok(())
    }

    /// The stored array, or `None` if nothing was ever saved under this key.
    pub fn load(&self) -> Result<Option<Vec<Region>>, StoreError> {
        let path = self.path();
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no stored parking spaces at {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let regions: Vec<Region> = serde_json::from_str(&json)?;
        debug!("restored {} parking spaces from {}", regions.len(), path.display());
        Ok(Some(regions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_order_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegionStore::new(dir.path(), DEFAULT_STORE_KEY);
        let regions = vec![
            Region {
                x: 10.5,
                y: 20.0,
                occupied: true,
            },
            Region::new(300.0, 40.25),
            Region {
                x: 0.0,
                y: 0.0,
                occupied: true,
            },
        ];

        store.save(&regions).unwrap();
        assert_eq!(store.load().unwrap(), Some(regions));
    }

    #[test]
    fn missing_key_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegionStore::new(dir.path(), "nothing-here");
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_creates_the_directory_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegionStore::new(dir.path().join("nested"), DEFAULT_STORE_KEY);
        store.save(&[Region::new(1.0, 2.0)]).unwrap();
        store.save(&[]).unwrap();
        assert_eq!(store.load().unwrap(), Some(Vec::new()));
        assert!(store.path().ends_with("parkingSpaces.json"));
    }

    #[test]
    fn stored_shape_is_a_plain_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegionStore::new(dir.path(), DEFAULT_STORE_KEY);
        store.save(&[Region::new(1.0, 2.0)]).unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"[{"x":1.0,"y":2.0,"occupied":false}]"#);
    }

    #[test]
    fn corrupt_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RegionStore::new(dir.path(), DEFAULT_STORE_KEY);
        std::fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Json(_))));
    }
}
