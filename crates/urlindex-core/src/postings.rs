//! Postings Index build/load/compaction (§4.8): shards by `domain_id
//! mod postings_shards`, each shard a `urlindex_types::format::postings::
//! PostingsShard`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use urlindex_types::error::Error;
use urlindex_types::format::postings::PostingsShard;
use urlindex_types::model::{DatasetId, DomainId, PostingLocator};

pub fn shard_of(domain_id: DomainId, shard_count: u32) -> u32 {
    (domain_id.0 % u64::from(shard_count)) as u32
}

pub fn shard_path(root: &Path, template: &str, shard: u32) -> PathBuf {
    root.join(template.replace("{shard}", &shard.to_string()))
}

/// Groups observations by shard and builds one [`PostingsShard`] per
/// shard. Observations for the same `(domain_id, dataset_id)` key keep
/// the order they were given in, matching ingestion order (§4.8
/// "Build": "preserving order").
pub fn build_full(
    shard_count: u32,
    observations: impl IntoIterator<Item = (DomainId, DatasetId, PostingLocator)>,
) -> HashMap<u32, PostingsShard> {
    let mut shards: HashMap<u32, PostingsShard> = HashMap::new();
    for (domain_id, dataset_id, locator) in observations {
        let shard = shard_of(domain_id, shard_count);
        shards
            .entry(shard)
            .or_default()
            .add(domain_id, dataset_id, locator);
    }
    shards
}

/// Incremental build: appends new locators to existing keys (or
/// creates new ones) within each affected shard, without touching
/// shards that saw no new observations (§4.8 "Incremental").
pub fn extend_incremental(
    shards: &mut HashMap<u32, PostingsShard>,
    shard_count: u32,
    observations: impl IntoIterator<Item = (DomainId, DatasetId, PostingLocator)>,
) {
    for (domain_id, dataset_id, locator) in observations {
        let shard = shard_of(domain_id, shard_count);
        shards
            .entry(shard)
            .or_default()
            .add(domain_id, dataset_id, locator);
    }
}

/// Compaction (§4.8): deduplicates `(file_id, row_group)` locators
/// within each `(domain_id, dataset_id)` key, without changing lookup
/// semantics — only the in-memory representation is rebuilt; callers
/// still need to serialise and publish a new version to make this
/// durable.
pub fn compact(shard: &PostingsShard) -> PostingsShard {
    let mut compacted = PostingsShard::new();
    for (&(domain_id, dataset_id), locators) in shard.entries_ref() {
        let mut seen = HashSet::new();
        for locator in locators {
            if seen.insert(*locator) {
                compacted.add(domain_id, dataset_id, *locator);
            }
        }
    }
    compacted
}

/// # Errors
///
/// If either artifact exists but cannot be read or parsed.
pub fn load(index_path: &Path, data_path: &Path) -> Result<Option<PostingsShard>, Error> {
    if !index_path.exists() || !data_path.exists() {
        return Ok(None);
    }
    let index_bytes = fs::read(index_path)?;
    let data_bytes = fs::read(data_path)?;
    let shard = PostingsShard::parse(&index_bytes, &data_bytes).map_err(|e| Error::ArtifactCorrupt {
        path: index_path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(shard))
}

/// # Errors
///
/// If either write fails.
pub fn save(shard: &PostingsShard, index_path: &Path, data_path: &Path) -> Result<(), Error> {
    for path in [index_path, data_path] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
    }
    let (index_bytes, data_bytes) = shard.serialise();
    fs::write(index_path, index_bytes)?;
    fs::write(data_path, data_bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use urlindex_types::model::FileId;

    fn locator(file_id: u32, row_group: u32) -> PostingLocator {
        PostingLocator {
            file_id: FileId(file_id),
            row_group,
        }
    }

    #[test]
    fn shard_of_is_modular() {
        assert_eq!(shard_of(DomainId(5), 4), 1);
        assert_eq!(shard_of(DomainId(8), 4), 0);
    }

    #[test]
    fn build_full_groups_by_shard() {
        let shards = build_full(
            2,
            vec![
                (DomainId(0), DatasetId(0), locator(1, 0)),
                (DomainId(1), DatasetId(0), locator(2, 0)),
            ],
        );
        assert_eq!(shards.len(), 2);
        assert!(shards[&0].locators_for(DomainId(0), DatasetId(0)).is_some());
        assert!(shards[&1].locators_for(DomainId(1), DatasetId(0)).is_some());
    }

    #[test]
    fn compact_deduplicates_locators() {
        let mut shard = PostingsShard::new();
        shard.add(DomainId(0), DatasetId(0), locator(1, 0));
        shard.add(DomainId(0), DatasetId(0), locator(1, 0));
        shard.add(DomainId(0), DatasetId(0), locator(1, 1));

        let compacted = compact(&shard);
        assert_eq!(
            compacted.locators_for(DomainId(0), DatasetId(0)).unwrap().len(),
            2
        );
    }
}
