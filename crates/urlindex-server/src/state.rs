//! Shared server state: the configuration, the currently-published
//! version (hot-swappable so a background rebuild can publish a new
//! one without restarting the server), and the two query-path caches.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use urlindex_core::context::{PostingsCache, RowGroupCache};
use urlindex_core::query::LoadedVersion;
use urlindex_types::config::Config;
use urlindex_types::error::Error;
use urlindex_types::model::Manifest;

const DEFAULT_POSTINGS_CACHE_WEIGHT: u64 = 256 * 1024 * 1024;
const DEFAULT_ROW_GROUP_CACHE_WEIGHT: u64 = 512 * 1024 * 1024;

/// Per-request deadline budget; §5 "every request carries a deadline".
pub const REQUEST_DEADLINE: Duration = Duration::from_secs(10);

pub struct AppState {
    pub config: Config,
    current: RwLock<Arc<LoadedVersion>>,
    pub postings_cache: PostingsCache,
    pub row_group_cache: RowGroupCache,
}

impl AppState {
    /// # Errors
    ///
    /// If the manifest names no published version, or that version's
    /// artifacts cannot be loaded.
    pub fn open(config: Config) -> Result<Self, Error> {
        let manifest = urlindex_core::manifest::load(&std::path::PathBuf::from(config.manifest_path()))?;
        let artifacts = manifest.current().cloned().ok_or(Error::VersionMissing)?;
        let loaded = LoadedVersion::open(&config, artifacts)?;

        Ok(Self {
            current: RwLock::new(Arc::new(loaded)),
            postings_cache: PostingsCache::with_desired_weight(DEFAULT_POSTINGS_CACHE_WEIGHT),
            row_group_cache: RowGroupCache::with_desired_weight(DEFAULT_ROW_GROUP_CACHE_WEIGHT),
            config,
        })
    }

    /// A cheap `Arc` clone of the currently-published version, pinned
    /// for the lifetime of one request (§4.11 "the server should pin
    /// the version for the duration of a paginated session").
    ///
    /// # Panics
    ///
    /// If the lock has been poisoned.
    pub fn current_version(&self) -> Arc<LoadedVersion> {
        self.current.read().expect(LOCK_POISON_MESSAGE).clone()
    }

    /// Re-reads the manifest and swaps in a newer version if one was
    /// published since the last load. A no-op if `current_version` is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// If the manifest or the newer version's artifacts cannot be read.
    ///
    /// # Panics
    ///
    /// If the lock has been poisoned.
    pub fn refresh(&self) -> Result<bool, Error> {
        let manifest: Manifest =
            urlindex_core::manifest::load(&std::path::PathBuf::from(self.config.manifest_path()))?;
        let Some(artifacts) = manifest.current().cloned() else {
            return Ok(false);
        };

        if artifacts.version == self.current_version().artifacts.version {
            return Ok(false);
        }

        let loaded = LoadedVersion::open(&self.config, artifacts)?;
        *self.current.write().expect(LOCK_POISON_MESSAGE) = Arc::new(loaded);
        Ok(true)
    }
}

const LOCK_POISON_MESSAGE: &str = "[INTERNAL ERROR] app state lock poisoned, cannot recover from this - aborting";
