//! Identity Layer (§4.2): dataset registry, and the hash-derived
//! `url_id`/`domain_prefix`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use urlindex_types::error::Error;
use urlindex_types::model::{DatasetId, DomainPrefix, UrlId};

/// `url_id = xxh3_64(raw)`, a probe key only (§3: "collisions are not
/// fatal").
pub fn url_id(raw: &str) -> UrlId {
    UrlId(xxhash_rust::xxh3::xxh3_64(raw.as_bytes()))
}

/// First two hex characters of `xxh3_64(domain)`, used purely to keep
/// partitions and the file tree shallow (§3 glossary: Domain prefix).
pub fn domain_prefix(domain: &str) -> DomainPrefix {
    let hash = xxhash_rust::xxh3::xxh3_64(domain.as_bytes());
    DomainPrefix(format!("{:02x}", (hash >> 56) as u8))
}

/// Persistent `name -> dataset_id` map (§4.2), guarded the way
/// `SharedCache` guards its inner `Cache`: a single mutex, held only
/// for the duration of a lookup-or-assign.
pub struct DatasetRegistry {
    path: PathBuf,
    inner: Mutex<HashMap<String, DatasetId>>,
}

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] dataset registry mutex poisoned, cannot recover from this - aborting";

impl DatasetRegistry {
    /// Loads the registry from `path` if it exists, else starts empty.
    ///
    /// # Errors
    ///
    /// If the file exists but cannot be read or is not valid JSON.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let map = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            inner: Mutex::new(map),
        })
    }

    /// Returns the existing `dataset_id` for `name`, or assigns `max +
    /// 1` (starting at 0) and persists the whole map (§4.2: "flushed
    /// after every assignment").
    ///
    /// # Panics
    ///
    /// If the mutex has been poisoned.
    ///
    /// # Errors
    ///
    /// If persisting the updated map to `self.path` fails.
    pub fn resolve(&self, name: &str) -> Result<DatasetId, Error> {
        let mut map = self.inner.lock().expect(MUTEX_POISON_MESSAGE);
        if let Some(&id) = map.get(name) {
            return Ok(id);
        }

        let next = map
            .values()
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(0);
        let id = DatasetId(next);
        map.insert(name.to_string(), id);
        persist(&self.path, &map)?;
        Ok(id)
    }

    /// # Panics
    ///
    /// If the mutex has been poisoned.
    pub fn len(&self) -> usize {
        self.inner.lock().expect(MUTEX_POISON_MESSAGE).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn persist(path: &Path, map: &HashMap<String, DatasetId>) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(map)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_id_is_deterministic() {
        assert_eq!(url_id("http://example.com/"), url_id("http://example.com/"));
        assert_ne!(url_id("http://example.com/a"), url_id("http://example.com/b"));
    }

    #[test]
    fn domain_prefix_is_two_hex_chars() {
        let prefix = domain_prefix("example.com");
        assert_eq!(prefix.0.len(), 2);
        assert!(prefix.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn resolve_assigns_sequentially_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry/dataset_registry.json");

        let registry = DatasetRegistry::load(&path).unwrap();
        let a = registry.resolve("alpha").unwrap();
        let b = registry.resolve("beta").unwrap();
        let a_again = registry.resolve("alpha").unwrap();

        assert_eq!(a, DatasetId(0));
        assert_eq!(b, DatasetId(1));
        assert_eq!(a, a_again);

        let reloaded = DatasetRegistry::load(&path).unwrap();
        assert_eq!(reloaded.resolve("alpha").unwrap(), DatasetId(0));
        assert_eq!(reloaded.len(), 2);
    }
}
