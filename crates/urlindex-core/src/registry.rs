//! File Registry build/load (§4.6): enumerates the partitioned
//! columnar root and assigns `file_id`s, preserving previous
//! assignments on incremental builds.

use std::fs;
use std::path::Path;

use urlindex_types::error::Error;
use urlindex_types::format::registry::FileRegistry;
use urlindex_types::model::{DatasetId, DomainPrefix};

/// One discovered columnar file under `dataset_id={n}/domain_prefix={hh}/part-*`,
/// relative to `columnar_root` (`base_path/urls`).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DiscoveredFile {
    pub dataset_id: DatasetId,
    pub domain_prefix: DomainPrefix,
    pub relative_path: String,
}

/// Walks `columnar_root` and returns every `part-*` file found, in a
/// deterministic (sorted-by-path) order so "enumeration order" (§4.6
/// "Full: ... assign IDs in enumeration order") is reproducible.
///
/// # Errors
///
/// If a directory cannot be read.
pub fn discover(columnar_root: &Path) -> Result<Vec<DiscoveredFile>, Error> {
    let mut found = Vec::new();
    if !columnar_root.exists() {
        return Ok(found);
    }

    for dataset_entry in read_sorted(columnar_root)? {
        let Some(dataset_id) = parse_prefixed(&dataset_entry, "dataset_id=") else {
            continue;
        };
        let dataset_dir = columnar_root.join(&dataset_entry);
        for prefix_entry in read_sorted(&dataset_dir)? {
            let Some(prefix) = prefix_entry.strip_prefix("domain_prefix=") else {
                continue;
            };
            let prefix_dir = dataset_dir.join(&prefix_entry);
            for part_entry in read_sorted(&prefix_dir)? {
                if !part_entry.starts_with("part-") {
                    continue;
                }
                let relative_path = format!("{dataset_entry}/{prefix_entry}/{part_entry}");
                found.push(DiscoveredFile {
                    dataset_id: DatasetId(dataset_id),
                    domain_prefix: DomainPrefix(prefix.to_string()),
                    relative_path,
                });
            }
        }
    }

    Ok(found)
}

fn read_sorted(dir: &Path) -> Result<Vec<String>, Error> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    Ok(names)
}

fn parse_prefixed(entry: &str, prefix: &str) -> Option<u32> {
    entry.strip_prefix(prefix)?.parse().ok()
}

/// Full build: a fresh registry with every discovered file assigned
/// `file_id`s in enumeration order.
pub fn build_full(files: &[DiscoveredFile]) -> FileRegistry {
    let mut registry = FileRegistry::new();
    for file in files {
        registry.append(file.dataset_id, file.domain_prefix.clone(), file.relative_path.clone());
    }
    registry
}

/// Incremental build: `prev` keeps every existing entry's id; any path
/// in `files` not already present is appended (§4.6 "Incremental").
pub fn extend_incremental(prev: &mut FileRegistry, files: &[DiscoveredFile]) -> Vec<String> {
    let mut newly_added = Vec::new();
    for file in files {
        if prev.by_path(&file.relative_path).is_none() {
            prev.append(file.dataset_id, file.domain_prefix.clone(), file.relative_path.clone());
            newly_added.push(file.relative_path.clone());
        }
    }
    newly_added
}

/// # Errors
///
/// If `path` exists but cannot be read or parsed.
pub fn load(path: &Path) -> Result<Option<FileRegistry>, Error> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let registry = FileRegistry::parse(&bytes).map_err(|e| Error::ArtifactCorrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(registry))
}

/// # Errors
///
/// If the write fails.
pub fn save(registry: &FileRegistry, path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, registry.serialise())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, dataset_id: u32, prefix: &str, part: &str) {
        let dir = root.join(format!("dataset_id={dataset_id}/domain_prefix={prefix}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(part), b"").unwrap();
    }

    #[test]
    fn discover_finds_files_in_deterministic_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), 0, "ab", "part-00001.parquet");
        touch(dir.path(), 0, "ab", "part-00000.parquet");
        touch(dir.path(), 1, "cd", "part-00000.parquet");

        let files = discover(dir.path()).unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].relative_path, "dataset_id=0/domain_prefix=ab/part-00000.parquet");
        assert_eq!(files[2].dataset_id, DatasetId(1));
    }

    #[test]
    fn incremental_extend_keeps_prior_ids_and_reports_new_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), 0, "ab", "part-00000.parquet");
        let mut registry = build_full(&discover(dir.path()).unwrap());
        let original_id = registry.by_path("dataset_id=0/domain_prefix=ab/part-00000.parquet").unwrap().file_id;

        touch(dir.path(), 0, "ab", "part-00001.parquet");
        let new_paths = extend_incremental(&mut registry, &discover(dir.path()).unwrap());

        assert_eq!(new_paths, vec!["dataset_id=0/domain_prefix=ab/part-00001.parquet".to_string()]);
        assert_eq!(
            registry.by_path("dataset_id=0/domain_prefix=ab/part-00000.parquet").unwrap().file_id,
            original_id
        );
        assert_eq!(registry.len(), 2);
    }
}
