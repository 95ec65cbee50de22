//! Domain Dictionary build/load (§4.4), wrapping
//! `urlindex_types::format::dictionary::DomainDictionary`'s binary
//! artifact with the append-only full/incremental build contract.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use urlindex_types::error::Error;
use urlindex_types::format::dictionary::DomainDictionary;

/// Full build: `domains` in any order, deduplicated and emitted in
/// ascending byte order (§4.4 "Full build").
pub fn build_full(domains: impl IntoIterator<Item = String>) -> DomainDictionary {
    let sorted: BTreeSet<String> = domains.into_iter().collect();
    let mut dict = DomainDictionary::new();
    dict.append(sorted);
    dict
}

/// Incremental build: load `prev` as-is, append only the domains in
/// `new_domains` not already present, in sorted order, **without**
/// re-sorting the whole dictionary (§4.4 "Incremental build" /
/// the append-only `domain_id` stability invariant in §9).
pub fn extend_incremental(prev: &mut DomainDictionary, new_domains: impl IntoIterator<Item = String>) {
    let novel: BTreeSet<String> = new_domains
        .into_iter()
        .filter(|d| prev.find(d).is_none())
        .collect();
    prev.append(novel);
}

/// # Errors
///
/// If `path` exists but cannot be read or parsed.
pub fn load(path: &Path) -> Result<Option<DomainDictionary>, Error> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let dict = DomainDictionary::parse(&bytes).map_err(|e| Error::ArtifactCorrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(dict))
}

/// # Errors
///
/// If compression or the write fails.
pub fn save(dict: &DomainDictionary, path: &Path, compression_level: i32) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = dict
        .serialise(compression_level)
        .map_err(|e| Error::Io(e.to_string()))?;
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use urlindex_types::model::DomainId;

    #[test]
    fn full_build_dedupes_and_sorts() {
        let dict = build_full(vec![
            "b.com".to_string(),
            "a.com".to_string(),
            "a.com".to_string(),
        ]);
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get(DomainId(0)), Some("a.com"));
        assert_eq!(dict.get(DomainId(1)), Some("b.com"));
    }

    #[test]
    fn incremental_extend_preserves_prior_ids() {
        let mut dict = build_full(vec!["a.com".to_string(), "c.com".to_string()]);
        extend_incremental(&mut dict, vec!["b.com".to_string(), "a.com".to_string()]);

        // prior ids for a.com/c.com unchanged; only b.com appended
        assert_eq!(dict.get(DomainId(0)), Some("a.com"));
        assert_eq!(dict.get(DomainId(1)), Some("c.com"));
        assert_eq!(dict.get(DomainId(2)), Some("b.com"));
        assert_eq!(dict.len(), 3);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dictionary.bin");
        let dict = build_full(vec!["a.com".to_string()]);
        save(&dict, &path, 3).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.get(DomainId(0)), Some("a.com"));
        assert!(load(&dir.path().join("missing.bin")).unwrap().is_none());
    }
}
