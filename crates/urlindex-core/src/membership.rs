//! Membership Index build/load (§4.7): wraps
//! `urlindex_types::format::membership::MembershipIndex`.

use std::fs;
use std::path::Path;

use urlindex_types::error::Error;
use urlindex_types::format::membership::MembershipIndex;
use urlindex_types::model::{DatasetId, DomainId};

/// Full build: add every observed `(domain_id, dataset_id)` pair.
pub fn build_full(
    domain_count: u64,
    observations: impl IntoIterator<Item = (DomainId, DatasetId)>,
) -> MembershipIndex {
    let mut index = MembershipIndex::with_domain_count(domain_count);
    for (domain_id, dataset_id) in observations {
        index.add(domain_id, dataset_id);
    }
    index
}

/// Incremental build: union new observations into `prev`, growing it
/// to cover any newly appended `domain_id`s (§4.7 "Incremental").
pub fn extend_incremental(
    prev: &mut MembershipIndex,
    domain_count: u64,
    observations: impl IntoIterator<Item = (DomainId, DatasetId)>,
) {
    prev.ensure_len(domain_count);
    for (domain_id, dataset_id) in observations {
        prev.add(domain_id, dataset_id);
    }
}

/// # Errors
///
/// If `path` exists but cannot be read or parsed.
pub fn load(path: &Path) -> Result<Option<MembershipIndex>, Error> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let index = MembershipIndex::parse(&bytes).map_err(|e| Error::ArtifactCorrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(index))
}

/// # Errors
///
/// If the write fails.
pub fn save(index: &MembershipIndex, path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, index.serialise())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_build_records_every_observation() {
        let index = build_full(
            2,
            vec![
                (DomainId(0), DatasetId(0)),
                (DomainId(0), DatasetId(1)),
                (DomainId(1), DatasetId(0)),
            ],
        );
        assert_eq!(index.cardinality(DomainId(0)), 2);
        assert_eq!(index.cardinality(DomainId(1)), 1);
    }

    #[test]
    fn incremental_extend_grows_and_unions() {
        let mut index = build_full(1, vec![(DomainId(0), DatasetId(0))]);
        extend_incremental(&mut index, 2, vec![(DomainId(0), DatasetId(1)), (DomainId(1), DatasetId(2))]);

        assert_eq!(index.cardinality(DomainId(0)), 2);
        assert_eq!(index.cardinality(DomainId(1)), 1);
    }
}
