//! Postings artifacts for one shard: `PDX1` (fixed-width index, sorted
//! by `(domain_id, dataset_id)`) and `PDD1` (variable-length payload,
//! varint-encoded `(file_id, row_group)` locator lists) (§4.8).
//!
//! A shard is chosen by `domain_id % shard_count` (§4.8 Build), so a
//! lookup only ever touches one `PDX1`/`PDD1` pair.

use crate::format::cursor::{write_header, CursorError, ReadCursor, WriteCursor};
use crate::model::{DatasetId, DomainId, FileId, PostingLocator};
use std::collections::BTreeMap;

pub const INDEX_MAGIC: &[u8; 4] = b"PDX1";
pub const DATA_MAGIC: &[u8; 4] = b"PDD1";
pub const VERSION: u32 = 1;

struct IndexRecord {
    domain_id: DomainId,
    dataset_id: DatasetId,
    payload_offset: u64,
    payload_len: u32,
}

/// One postings shard, built in memory and serialised to its `PDX1`
/// index + `PDD1` data pair.
#[derive(Debug, Clone, Default)]
pub struct PostingsShard {
    entries: BTreeMap<(DomainId, DatasetId), Vec<PostingLocator>>,
}

impl PostingsShard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, domain_id: DomainId, dataset_id: DatasetId, locator: PostingLocator) {
        self.entries
            .entry((domain_id, dataset_id))
            .or_default()
            .push(locator);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Produces the `(PDX1 bytes, PDD1 bytes)` pair. Locators within a
    /// single `(domain_id, dataset_id)` group keep insertion order,
    /// matching the order rows were written during ingestion.
    pub fn serialise(&self) -> (Vec<u8>, Vec<u8>) {
        let mut data = WriteCursor::default();
        write_header(&mut data, DATA_MAGIC, VERSION);

        let mut records = Vec::with_capacity(self.entries.len());
        for (&(domain_id, dataset_id), locators) in &self.entries {
            let payload_offset = data.index() as u64;
            data.write_varint(locators.len() as u64);
            for locator in locators {
                data.write_varint(u64::from(locator.file_id.0));
                data.write_varint(u64::from(locator.row_group));
            }
            let payload_len = (data.index() as u64 - payload_offset) as u32;
            records.push(IndexRecord {
                domain_id,
                dataset_id,
                payload_offset,
                payload_len,
            });
        }

        let mut index = WriteCursor::default();
        write_header(&mut index, INDEX_MAGIC, VERSION);
        index.write_u64(records.len() as u64);
        for record in &records {
            index.write_u64(record.domain_id.0);
            index.write_u32(record.dataset_id.0);
            index.write_u64(record.payload_offset);
            index.write_u32(record.payload_len);
        }

        (index.octets, data.octets)
    }

    /// # Errors
    ///
    /// If either half's header is wrong or truncated.
    pub fn parse(index_bytes: &[u8], data_bytes: &[u8]) -> Result<Self, CursorError> {
        let mut index_cursor = ReadCursor::new(index_bytes);
        index_cursor.expect_header(INDEX_MAGIC, VERSION)?;
        let count = index_cursor.next_u64()?;

        let mut data_header_cursor = ReadCursor::new(data_bytes);
        data_header_cursor.expect_header(DATA_MAGIC, VERSION)?;

        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let domain_id = DomainId(index_cursor.next_u64()?);
            let dataset_id = DatasetId(index_cursor.next_u32()?);
            let payload_offset = index_cursor.next_u64()? as usize;
            let payload_len = index_cursor.next_u32()? as usize;

            let payload = data_bytes
                .get(payload_offset..payload_offset + payload_len)
                .ok_or(CursorError::Truncated)?;
            let mut payload_cursor = ReadCursor::new(payload);
            let locator_count = payload_cursor.next_varint()?;
            let mut locators = Vec::with_capacity(locator_count as usize);
            for _ in 0..locator_count {
                let file_id = FileId(payload_cursor.next_varint()? as u32);
                let row_group = payload_cursor.next_varint()? as u32;
                locators.push(PostingLocator { file_id, row_group });
            }

            entries.insert((domain_id, dataset_id), locators);
        }

        Ok(Self { entries })
    }

    pub fn locators_for(
        &self,
        domain_id: DomainId,
        dataset_id: DatasetId,
    ) -> Option<&[PostingLocator]> {
        self.entries
            .get(&(domain_id, dataset_id))
            .map(Vec::as_slice)
    }

    /// Iterates every `(domain_id, dataset_id) -> locators` entry, used
    /// by compaction and incremental merges.
    pub fn entries_ref(&self) -> impl Iterator<Item = (&(DomainId, DatasetId), &Vec<PostingLocator>)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_locators_for_multiple_domains() {
        let mut shard = PostingsShard::new();
        shard.add(
            DomainId(1),
            DatasetId(0),
            PostingLocator {
                file_id: FileId(7),
                row_group: 0,
            },
        );
        shard.add(
            DomainId(1),
            DatasetId(0),
            PostingLocator {
                file_id: FileId(7),
                row_group: 1,
            },
        );
        shard.add(
            DomainId(1),
            DatasetId(2),
            PostingLocator {
                file_id: FileId(9),
                row_group: 0,
            },
        );

        let (index_bytes, data_bytes) = shard.serialise();
        let parsed = PostingsShard::parse(&index_bytes, &data_bytes).unwrap();

        assert_eq!(
            parsed.locators_for(DomainId(1), DatasetId(0)).unwrap().len(),
            2
        );
        assert_eq!(
            parsed.locators_for(DomainId(1), DatasetId(2)).unwrap(),
            &[PostingLocator {
                file_id: FileId(9),
                row_group: 0
            }]
        );
        assert!(parsed.locators_for(DomainId(1), DatasetId(5)).is_none());
    }

    #[test]
    fn empty_shard_round_trips() {
        let shard = PostingsShard::new();
        let (index_bytes, data_bytes) = shard.serialise();
        let parsed = PostingsShard::parse(&index_bytes, &data_bytes).unwrap();
        assert!(parsed.is_empty());
    }
}
