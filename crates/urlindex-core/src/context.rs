//! Per-request context threaded through the query path, directly
//! grounded on `dns_resolver::context::Context`: shared read-only state
//! (the pinned manifest version, the caches) plus request-local state
//! (a deadline instead of a recursion question-stack).

use std::sync::Arc;
use std::time::Instant;

use urlindex_types::model::{DatasetId, DomainId, FileId, RowRecord, VersionArtifacts};

use crate::cache::SharedLruCache;

/// Key for the postings-payload cache: one shard's decoded locator list
/// for a `(domain_id, dataset_id)` pair.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PostingsCacheKey {
    pub shard: u32,
    pub domain_id: DomainId,
    pub dataset_id: DatasetId,
}

/// Key for the row-group page cache: one decoded row group of one
/// columnar file.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct RowGroupCacheKey {
    pub file_id: FileId,
    pub row_group: u32,
}

pub type PostingsCache = SharedLruCache<PostingsCacheKey, Arc<Vec<urlindex_types::model::PostingLocator>>>;
pub type RowGroupCache = SharedLruCache<RowGroupCacheKey, Arc<Vec<RowRecord>>>;

/// Threads the pinned manifest version, deadline, and caches through a
/// single query request. `'a` ties the context's lifetime to the
/// caller-owned `VersionArtifacts` and caches, avoiding a clone per
/// request the way the teacher avoids cloning `Zones` per query.
pub struct Context<'a> {
    pub version: &'a VersionArtifacts,
    pub postings_cache: &'a PostingsCache,
    pub row_group_cache: &'a RowGroupCache,
    deadline: Instant,
}

impl<'a> Context<'a> {
    pub fn new(
        version: &'a VersionArtifacts,
        postings_cache: &'a PostingsCache,
        row_group_cache: &'a RowGroupCache,
        deadline: Instant,
    ) -> Self {
        Self {
            version,
            postings_cache,
            row_group_cache,
            deadline,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
