//! MPHF Resolver build/load (§4.5): wraps
//! `urlindex_types::format::mphf::MphfTable`, owning the choice of
//! table size and the dictionary-hash embedding.

use std::fs;
use std::path::Path;

use urlindex_types::error::Error;
use urlindex_types::format::dictionary::DomainDictionary;
use urlindex_types::format::mphf::MphfTable;
use urlindex_types::model::DomainId;

fn dictionary_hash(dict: &DomainDictionary) -> u64 {
    let mut hasher = xxhash_rust::xxh3::Xxh3::new();
    for domain in dict.iter() {
        std::hash::Hasher::write(&mut hasher, domain.as_bytes());
        std::hash::Hasher::write_u8(&mut hasher, 0);
    }
    std::hash::Hasher::finish(&hasher)
}

/// Rebuilds the table from scratch over `dict` (§4.5 "Rebuild policy").
/// Table size is the next odd number at least twice the domain count,
/// which keeps load factor low without needing true minimal-perfect
/// hashing.
pub fn build(dict: &DomainDictionary) -> MphfTable {
    let table_size = ((dict.len().max(1)) * 2) | 1;
    let entries: Vec<(u64, &str, DomainId)> = dict
        .iter()
        .enumerate()
        .map(|(i, domain)| {
            (
                xxhash_rust::xxh3::xxh3_64(domain.as_bytes()),
                domain,
                DomainId(i as u64),
            )
        })
        .collect();
    MphfTable::build(&entries, table_size, dictionary_hash(dict))
}

/// Resolves `domain` against `table`, verifying the candidate against
/// `dict` per the MPHF contract (§4.5: caller must compare strings).
pub fn resolve(table: &MphfTable, dict: &DomainDictionary, domain: &str) -> Option<DomainId> {
    let hash = xxhash_rust::xxh3::xxh3_64(domain.as_bytes());
    let candidate = table.lookup(hash, domain)?;
    if dict.get(candidate) == Some(domain) {
        Some(candidate)
    } else {
        None
    }
}

/// # Errors
///
/// If `path` exists but cannot be read or parsed.
pub fn load(path: &Path) -> Result<Option<MphfTable>, Error> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let table = MphfTable::parse(&bytes).map_err(|e| Error::ArtifactCorrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(table))
}

/// # Errors
///
/// If the write fails.
pub fn save(table: &MphfTable, path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, table.serialise())?;
    Ok(())
}

/// Verifies `table` was built over exactly `dict` (§4.5: "A hash of
/// the accompanying dictionary is embedded; loaders must verify it").
pub fn verify_dictionary_hash(table: &MphfTable, dict: &DomainDictionary) -> bool {
    table.dictionary_hash() == dictionary_hash(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::build_full;

    #[test]
    fn resolves_every_domain_in_the_dictionary() {
        let dict = build_full(vec![
            "a.com".to_string(),
            "b.org".to_string(),
            "sub.c.net".to_string(),
        ]);
        let table = build(&dict);
        assert!(verify_dictionary_hash(&table, &dict));

        for domain in dict.iter() {
            let expected = dict.find(domain).unwrap();
            assert_eq!(resolve(&table, &dict, domain), Some(expected));
        }
    }

    #[test]
    fn absent_domain_resolves_to_none() {
        let dict = build_full(vec!["a.com".to_string()]);
        let table = build(&dict);
        assert_eq!(resolve(&table, &dict, "z.com"), None);
    }

    #[test]
    fn dictionary_hash_changes_when_domains_change() {
        let dict_a = build_full(vec!["a.com".to_string()]);
        let dict_b = build_full(vec!["a.com".to_string(), "b.com".to_string()]);
        let table = build(&dict_a);
        assert!(!verify_dictionary_hash(&table, &dict_b));
    }
}
