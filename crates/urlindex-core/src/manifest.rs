//! Manifest (§4.9): names every version's artifacts plus the current
//! pointer, published by write-temp-then-rename so a reader never
//! observes a partially-written manifest.

use std::fs;
use std::path::Path;

use urlindex_types::error::Error;
use urlindex_types::model::{Manifest, VersionArtifacts};

/// # Errors
///
/// If `path` exists but cannot be read or parsed as JSON.
pub fn load(path: &Path) -> Result<Manifest, Error> {
    if !path.exists() {
        return Ok(Manifest::default());
    }
    let bytes = fs::read(path)?;
    let manifest: Manifest = serde_json::from_slice(&bytes)?;
    Ok(manifest)
}

/// Publishes `version` as the new current version: appends it to
/// `manifest.versions` (retaining `version_retention_count` most recent
/// ones, oldest dropped from the document only — actual file deletion
/// is `gc`'s job), then atomically swaps the manifest document into
/// place (§4.9 "Atomic publish protocol").
///
/// # Errors
///
/// If serialising or the write-then-rename fails.
pub fn publish(
    path: &Path,
    mut manifest: Manifest,
    version: VersionArtifacts,
    version_retention_count: u32,
) -> Result<Manifest, Error> {
    manifest.current_version = Some(version.version.clone());
    manifest.versions.push(version);

    let retain = version_retention_count.max(1) as usize;
    if manifest.versions.len() > retain {
        let drop_count = manifest.versions.len() - retain;
        manifest.versions.drain(0..drop_count);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(&manifest)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(name: &str) -> VersionArtifacts {
        VersionArtifacts {
            version: name.to_string(),
            dictionary_path: String::new(),
            mphf_path: String::new(),
            membership_path: String::new(),
            postings_shard_path_template: String::new(),
            file_registry_path: String::new(),
            columnar_root: String::new(),
            created_at_unix_ms: 0,
        }
    }

    #[test]
    fn publish_sets_current_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index/manifest.json");

        let manifest = load(&path).unwrap();
        let manifest = publish(&path, manifest, version("v1"), 3).unwrap();
        assert_eq!(manifest.current_version, Some("v1".to_string()));

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.current_version, Some("v1".to_string()));
        assert_eq!(reloaded.current().unwrap().version, "v1");
    }

    #[test]
    fn publish_trims_to_retention_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut manifest = Manifest::default();
        for i in 0..5 {
            manifest = publish(&path, manifest, version(&format!("v{i}")), 2).unwrap();
        }

        assert_eq!(manifest.versions.len(), 2);
        assert_eq!(manifest.versions[0].version, "v3");
        assert_eq!(manifest.versions[1].version, "v4");
        assert_eq!(manifest.current_version, Some("v4".to_string()));
    }
}
