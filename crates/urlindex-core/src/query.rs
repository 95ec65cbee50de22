//! Query Service (§4.11): Operation A (`datasets_of`) and Operation B
//! (`urls_of`), chaining MPHF resolution, dictionary verification, and
//! membership/postings lookup down to a bounded row-group scan.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{StringArray, UInt64Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use urlindex_types::config::Config;
use urlindex_types::error::Error;
use urlindex_types::format::dictionary::DomainDictionary;
use urlindex_types::format::membership::MembershipIndex;
use urlindex_types::format::mphf::MphfTable;
use urlindex_types::format::registry::FileRegistry;
use urlindex_types::model::{
    DatasetId, DatasetMembership, DomainId, FileId, PostingLocator, RowRecord, UrlId, UrlItem,
    VersionArtifacts,
};

use crate::context::{Context, PostingsCacheKey, RowGroupCacheKey};
use crate::normalize::normalize_domain;
use crate::{mphf, postings};

/// Every artifact needed to answer queries against one published
/// version, loaded once and shared read-only across requests (§5
/// "query handlers ... share read-only, memory-mapped index artifacts").
pub struct LoadedVersion {
    pub artifacts: VersionArtifacts,
    pub columnar_root: PathBuf,
    pub dictionary: DomainDictionary,
    pub mphf_table: MphfTable,
    pub membership: MembershipIndex,
    pub file_registry: FileRegistry,
    pub postings_shards: u32,
}

impl LoadedVersion {
    /// # Errors
    ///
    /// If any artifact named by `artifacts` is missing, corrupt, or was
    /// not built over this same dictionary.
    pub fn open(config: &Config, artifacts: VersionArtifacts) -> Result<Self, Error> {
        let dictionary = crate::dictionary::load(&PathBuf::from(&artifacts.dictionary_path))?
            .ok_or(Error::VersionMissing)?;
        let mphf_table =
            mphf::load(&PathBuf::from(&artifacts.mphf_path))?.ok_or(Error::VersionMissing)?;
        let membership = crate::membership::load(&PathBuf::from(&artifacts.membership_path))?
            .ok_or(Error::VersionMissing)?;
        let file_registry = crate::registry::load(&PathBuf::from(&artifacts.file_registry_path))?
            .ok_or(Error::VersionMissing)?;

        if !mphf::verify_dictionary_hash(&mphf_table, &dictionary) {
            return Err(Error::ArtifactCorrupt {
                path: artifacts.mphf_path.clone(),
                reason: "dictionary hash embedded in the MPHF does not match the dictionary".to_string(),
            });
        }

        Ok(Self {
            columnar_root: PathBuf::from(&artifacts.columnar_root),
            postings_shards: config.postings_shards,
            dictionary,
            mphf_table,
            membership,
            file_registry,
            artifacts,
        })
    }

    fn resolve_domain(&self, domain: &str) -> Option<DomainId> {
        mphf::resolve(&self.mphf_table, &self.dictionary, domain)
    }
}

/// Result of Operation A.
#[derive(Debug, Clone)]
pub struct DatasetsOfResult {
    pub domain: String,
    pub domain_id: Option<DomainId>,
    pub datasets: Vec<DatasetMembership>,
}

/// Operation A — "which datasets contain domain D" (§4.11).
///
/// # Errors
///
/// If `domain_str` does not normalize to a registrable domain.
pub fn datasets_of(version: &LoadedVersion, domain_str: &str) -> Result<DatasetsOfResult, Error> {
    let domain = normalize_domain(domain_str).map_err(|e| Error::InputMalformed(e.to_string()))?;

    let Some(domain_id) = version.resolve_domain(&domain) else {
        return Ok(DatasetsOfResult {
            domain,
            domain_id: None,
            datasets: Vec::new(),
        });
    };

    let datasets = version
        .membership
        .datasets_of(domain_id)
        .into_iter()
        .map(|dataset_id| DatasetMembership {
            dataset_id,
            url_count_est: None,
        })
        .collect();

    Ok(DatasetsOfResult {
        domain,
        domain_id: Some(domain_id),
        datasets,
    })
}

/// Result of Operation B.
#[derive(Debug, Clone)]
pub struct UrlsOfResult {
    pub domain: String,
    pub dataset_id: DatasetId,
    pub total_est: Option<u64>,
    pub items: Vec<UrlItem>,
    pub next_offset: Option<u64>,
}

/// Operation B — paginated URLs for `(domain, dataset)` (§4.11).
/// `ctx` pins the version and carries the request deadline and caches;
/// `version` must be the same version `ctx` was built against.
///
/// # Errors
///
/// If `domain_str` does not normalize, or a postings/row-group read
/// fails for a reason other than the artifact simply being absent.
pub fn urls_of(
    ctx: &Context<'_>,
    version: &LoadedVersion,
    config: &Config,
    domain_str: &str,
    dataset_id: DatasetId,
    offset: u64,
    limit: u32,
) -> Result<UrlsOfResult, Error> {
    let domain = normalize_domain(domain_str).map_err(|e| Error::InputMalformed(e.to_string()))?;
    let limit = config.clamp_limit(limit);

    let empty = |next_offset: Option<u64>| UrlsOfResult {
        domain: domain.clone(),
        dataset_id,
        total_est: None,
        items: Vec::new(),
        next_offset,
    };

    if limit == 0 {
        return Ok(empty(Some(offset)));
    }

    let Some(domain_id) = version.resolve_domain(&domain) else {
        return Ok(empty(None));
    };

    let locators = locators_for(ctx, version, domain_id, dataset_id)?;
    if locators.is_empty() {
        return Ok(empty(None));
    }

    let mut consumed = 0u64;
    let mut items = Vec::new();
    let mut more_may_exist = false;

    'locators: for locator in locators.iter() {
        if ctx.is_expired() {
            more_may_exist = true;
            break;
        }

        let rows = row_group(ctx, version, locator.file_id, locator.row_group)?;
        for row in rows.iter() {
            if row.domain != domain {
                continue;
            }
            if consumed < offset {
                consumed += 1;
                continue;
            }
            if items.len() as u32 >= limit {
                more_may_exist = true;
                break 'locators;
            }
            items.push(UrlItem {
                url_id: row.url_id,
                url: row.canonical_url().reconstruct(),
                ts: None,
            });
            consumed += 1;
        }
    }

    let next_offset = more_may_exist.then(|| offset + items.len() as u64);
    Ok(UrlsOfResult {
        domain,
        dataset_id,
        total_est: None,
        items,
        next_offset,
    })
}

fn locators_for(
    ctx: &Context<'_>,
    version: &LoadedVersion,
    domain_id: DomainId,
    dataset_id: DatasetId,
) -> Result<Arc<Vec<PostingLocator>>, Error> {
    let shard = postings::shard_of(domain_id, version.postings_shards);
    let key = PostingsCacheKey {
        shard,
        domain_id,
        dataset_id,
    };
    if let Some(cached) = ctx.postings_cache.get(&key) {
        return Ok(cached);
    }

    let index_path = PathBuf::from(
        version
            .artifacts
            .postings_shard_path_template
            .replace("{shard}", &shard.to_string()),
    )
    .with_extension("pdx1");
    let data_path = index_path.with_extension("pdd1");

    let Some(shard_data) = postings::load(&index_path, &data_path)? else {
        return Ok(Arc::new(Vec::new()));
    };

    let locators = shard_data
        .locators_for(domain_id, dataset_id)
        .map(<[PostingLocator]>::to_vec)
        .unwrap_or_default();
    let weight = locators.len() as u64 * 16 + 1;
    let locators = Arc::new(locators);
    ctx.postings_cache.insert(key, locators.clone(), weight);
    Ok(locators)
}

fn row_group(
    ctx: &Context<'_>,
    version: &LoadedVersion,
    file_id: FileId,
    row_group: u32,
) -> Result<Arc<Vec<RowRecord>>, Error> {
    let key = RowGroupCacheKey { file_id, row_group };
    if let Some(cached) = ctx.row_group_cache.get(&key) {
        return Ok(cached);
    }

    let entry = version.file_registry.by_id(file_id).ok_or_else(|| Error::ArtifactCorrupt {
        path: format!("file_id={}", file_id.0),
        reason: "unknown to the file registry".to_string(),
    })?;
    let path = version.columnar_root.join(&entry.relative_path);

    let rows = read_row_group(&path, row_group)?;
    let weight = rows.iter().map(row_weight).sum::<u64>().max(1);
    let rows = Arc::new(rows);
    ctx.row_group_cache.insert(key, rows.clone(), weight);
    Ok(rows)
}

fn row_weight(row: &RowRecord) -> u64 {
    (32 + row.scheme.len() + row.host.len() + row.path_query.len() + row.domain.len()) as u64
}

fn read_row_group(path: &Path, row_group: u32) -> Result<Vec<RowRecord>, Error> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::ArtifactCorrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?
        .with_row_groups(vec![row_group as usize])
        .build()
        .map_err(|e| Error::ArtifactCorrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| Error::ArtifactCorrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let domain_id = column_u64(&batch, "domain_id", path)?;
        let url_id = column_u64(&batch, "url_id", path)?;
        let scheme = column_str(&batch, "scheme", path)?;
        let host = column_str(&batch, "host", path)?;
        let path_query = column_str(&batch, "path_query", path)?;
        let domain = column_str(&batch, "domain", path)?;

        for i in 0..batch.num_rows() {
            rows.push(RowRecord {
                domain_id: DomainId(domain_id.value(i)),
                url_id: UrlId(url_id.value(i)),
                scheme: scheme.value(i).to_string(),
                host: host.value(i).to_string(),
                path_query: path_query.value(i).to_string(),
                domain: domain.value(i).to_string(),
            });
        }
    }
    Ok(rows)
}

fn column_u64<'b>(batch: &'b RecordBatch, name: &str, path: &Path) -> Result<&'b UInt64Array, Error> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
        .ok_or_else(|| Error::ArtifactCorrupt {
            path: path.display().to_string(),
            reason: format!("missing or mistyped column '{name}'"),
        })
}

fn column_str<'b>(batch: &'b RecordBatch, name: &str, path: &Path) -> Result<&'b StringArray, Error> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::ArtifactCorrupt {
            path: path.display().to_string(),
            reason: format!("missing or mistyped column '{name}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SharedLruCache;
    use crate::writer::Writer;
    use std::time::{Duration, Instant};
    use urlindex_types::model::PartitionKey;

    fn row(domain: &str, i: u64) -> RowRecord {
        RowRecord {
            domain_id: DomainId(0),
            url_id: UrlId(i),
            scheme: "https".to_string(),
            host: domain.to_string(),
            path_query: format!("/p{i}"),
            domain: domain.to_string(),
        }
    }

    fn test_config(base_path: &str) -> Config {
        Config {
            base_path: base_path.to_string(),
            partition_buffer_size: 128 * 1024 * 1024,
            global_buffer_limit: 2 * 1024 * 1024 * 1024,
            compression_level: 3,
            postings_shards: 4,
            max_limit: 10_000,
            default_limit: 1_000,
            version_retention_count: 3,
        }
    }

    fn build_one_file_version(dir: &std::path::Path, domain: &str, row_count: u64) -> (Config, LoadedVersion) {
        let config = test_config(dir.to_str().unwrap());
        let columnar_root = PathBuf::from(config.columnar_root());

        let writer = Writer::new(&columnar_root, config.partition_buffer_size, config.global_buffer_limit, config.compression_level);
        let key = PartitionKey {
            dataset_id: DatasetId(0),
            domain_prefix: crate::identity::domain_prefix(domain),
        };
        for i in 0..row_count {
            writer.write_row(key.clone(), row(domain, i)).unwrap();
        }
        writer.flush_all().unwrap();

        let report = crate::builder::full_build(&config).unwrap();
        let manifest = crate::manifest::load(&PathBuf::from(config.manifest_path())).unwrap();
        let artifacts = manifest.versions.iter().find(|v| v.version == report.version).unwrap().clone();

        let version = LoadedVersion::open(&config, artifacts).unwrap();
        (config, version)
    }

    #[test]
    fn datasets_of_finds_the_dataset_a_domain_was_ingested_under() {
        let dir = tempfile::tempdir().unwrap();
        let (_config, version) = build_one_file_version(dir.path(), "example.com", 3);

        let result = datasets_of(&version, "Example.com").unwrap();
        assert_eq!(result.domain, "example.com");
        assert_eq!(result.datasets.len(), 1);
        assert_eq!(result.datasets[0].dataset_id, DatasetId(0));
    }

    #[test]
    fn datasets_of_unknown_domain_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (_config, version) = build_one_file_version(dir.path(), "example.com", 1);

        let result = datasets_of(&version, "nowhere.org").unwrap();
        assert!(result.datasets.is_empty());
    }

    #[test]
    fn urls_of_paginates_and_reconstructs_urls() {
        let dir = tempfile::tempdir().unwrap();
        let (config, version) = build_one_file_version(dir.path(), "example.com", 10);

        let postings_cache: crate::context::PostingsCache = SharedLruCache::with_desired_weight(1024 * 1024);
        let row_group_cache: crate::context::RowGroupCache = SharedLruCache::with_desired_weight(1024 * 1024);
        let ctx = Context::new(&version.artifacts, &postings_cache, &row_group_cache, Instant::now() + Duration::from_secs(30));

        let page1 = urls_of(&ctx, &version, &config, "example.com", DatasetId(0), 0, 4).unwrap();
        assert_eq!(page1.items.len(), 4);
        assert_eq!(page1.next_offset, Some(4));
        assert!(page1.items[0].url.starts_with("https://example.com/p"));

        let page2 = urls_of(&ctx, &version, &config, "example.com", DatasetId(0), 4, 100).unwrap();
        assert_eq!(page2.items.len(), 6);
        assert_eq!(page2.next_offset, None);
    }

    #[test]
    fn urls_of_unknown_dataset_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (config, version) = build_one_file_version(dir.path(), "example.com", 2);

        let postings_cache: crate::context::PostingsCache = SharedLruCache::with_desired_weight(1024 * 1024);
        let row_group_cache: crate::context::RowGroupCache = SharedLruCache::with_desired_weight(1024 * 1024);
        let ctx = Context::new(&version.artifacts, &postings_cache, &row_group_cache, Instant::now() + Duration::from_secs(30));

        let result = urls_of(&ctx, &version, &config, "example.com", DatasetId(999), 0, 10).unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.next_offset, None);
    }

    #[test]
    fn urls_of_zero_limit_returns_empty_with_unchanged_offset() {
        let dir = tempfile::tempdir().unwrap();
        let (config, version) = build_one_file_version(dir.path(), "example.com", 2);

        let postings_cache: crate::context::PostingsCache = SharedLruCache::with_desired_weight(1024 * 1024);
        let row_group_cache: crate::context::RowGroupCache = SharedLruCache::with_desired_weight(1024 * 1024);
        let ctx = Context::new(&version.artifacts, &postings_cache, &row_group_cache, Instant::now() + Duration::from_secs(30));

        let result = urls_of(&ctx, &version, &config, "example.com", DatasetId(0), 7, 0).unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.next_offset, Some(7));
    }
}
