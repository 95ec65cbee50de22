//! Canonical data model: URLs, identifiers, rows, and index artifact
//! records. See §3 of the specification.

use serde::{Deserialize, Serialize};

/// A URL after normalisation: scheme, host, path+query, and registrable
/// domain. See §4.1.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct CanonicalUrl {
    pub scheme: String,
    pub host: String,
    pub path_query: String,
    pub domain: String,
}

impl CanonicalUrl {
    /// `scheme + "://" + host + path_query`, the inverse of normalisation
    /// for reconstructing a user-facing URL (§4.11 Operation B step 4).
    pub fn reconstruct(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path_query)
    }
}

/// Persistent per-dataset identifier. Assigned sequentially by the
/// dataset registry; never reused or reassigned (§3).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub u32);

impl DatasetId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a domain string in the current version's sorted/append-only
/// domain dictionary. Stable across incremental rebuilds (§3 invariants).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(pub u64);

impl std::fmt::Display for DomainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `xxh3_64` of the raw URL bytes. A probe key only: collisions are not
/// fatal, since the `domain` filter in Operation B rejects false matches.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlId(pub u64);

impl std::fmt::Display for UrlId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequentially-assigned identifier for a columnar file. Never reused
/// after assignment, even once the file is deleted (§3).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u32);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// First two hex characters of `xxh3_64(domain)`, used purely as a
/// partitioning key (glossary: Domain prefix).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct DomainPrefix(pub String);

impl std::fmt::Display for DomainPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The partition key for the columnar writer: `(dataset_id,
/// domain_prefix)`. Each partition holds append-only, monotonically
/// numbered `part-NNNNN` files (§3).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub dataset_id: DatasetId,
    pub domain_prefix: DomainPrefix,
}

impl PartitionKey {
    pub fn relative_dir(&self) -> String {
        format!(
            "dataset_id={}/domain_prefix={}",
            self.dataset_id.0, self.domain_prefix.0
        )
    }
}

/// A row as stored in the columnar files (§3). `dataset_id` and
/// `domain_prefix` live in the file's directory path, not the row body.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub domain_id: DomainId,
    pub url_id: UrlId,
    pub scheme: String,
    pub host: String,
    pub path_query: String,
    pub domain: String,
}

impl RowRecord {
    pub fn canonical_url(&self) -> CanonicalUrl {
        CanonicalUrl {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            path_query: self.path_query.clone(),
            domain: self.domain.clone(),
        }
    }
}

/// A file registry entry: `file_id -> (dataset_id, domain_prefix, path)`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileRegistryEntry {
    pub file_id: FileId,
    pub dataset_id: DatasetId,
    pub domain_prefix: DomainPrefix,
    pub relative_path: String,
}

/// A single posting: where a `(domain, dataset)` pair's rows live.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PostingLocator {
    pub file_id: FileId,
    pub row_group: u32,
}

/// One item returned from Operation A (`GET /v1/domain/{domain}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMembership {
    pub dataset_id: DatasetId,
    pub url_count_est: Option<u64>,
}

/// One item returned from Operation B (`urls_of`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlItem {
    pub url_id: UrlId,
    pub url: String,
    pub ts: Option<String>,
}

/// Names every artifact of one published index version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionArtifacts {
    pub version: String,
    pub dictionary_path: String,
    pub mphf_path: String,
    pub membership_path: String,
    /// `{shard}` is substituted with the shard number.
    pub postings_shard_path_template: String,
    pub file_registry_path: String,
    pub columnar_root: String,
    pub created_at_unix_ms: i64,
}

/// The manifest: all known versions plus the currently-published one.
/// Readers that opened this before a publish-time rename see the old
/// version for the duration of their request (§4.9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub current_version: Option<String>,
    pub versions: Vec<VersionArtifacts>,
}

impl Manifest {
    pub fn current(&self) -> Option<&VersionArtifacts> {
        let current = self.current_version.as_ref()?;
        self.versions.iter().find(|v| &v.version == current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstruct_round_trips_components() {
        let url = CanonicalUrl {
            scheme: "https".to_string(),
            host: "example.com".to_string(),
            path_query: "/a?a=1&b=2".to_string(),
            domain: "example.com".to_string(),
        };
        assert_eq!(url.reconstruct(), "https://example.com/a?a=1&b=2");
    }

    #[test]
    fn manifest_current_looks_up_by_name() {
        let mut manifest = Manifest::default();
        manifest.versions.push(VersionArtifacts {
            version: "v1".to_string(),
            dictionary_path: String::new(),
            mphf_path: String::new(),
            membership_path: String::new(),
            postings_shard_path_template: String::new(),
            file_registry_path: String::new(),
            columnar_root: String::new(),
            created_at_unix_ms: 0,
        });
        manifest.current_version = Some("v1".to_string());
        assert!(manifest.current().is_some());

        manifest.current_version = Some("v2".to_string());
        assert!(manifest.current().is_none());
    }
}
