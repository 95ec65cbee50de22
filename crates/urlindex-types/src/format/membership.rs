//! `DTDR` artifact: `domain_id -> set<dataset_id>` (§4.7).
//!
//! Layout: `[magic "DTDR"][version u32][N_domains u64][index_offset
//! u64][blobs…][index: N × (start u64, len u32)]`. Each blob is a
//! Roaring-bitmap serialisation of the dataset ids for that domain.

use crate::format::cursor::{write_header, CursorError, ReadCursor, WriteCursor};
use crate::model::{DatasetId, DomainId};
use roaring::RoaringBitmap;

pub const MAGIC: &[u8; 4] = b"DTDR";
pub const VERSION: u32 = 1;

/// In-memory membership index: one bitmap of `dataset_id`s per `domain_id`.
#[derive(Debug, Clone, Default)]
pub struct MembershipIndex {
    bitmaps: Vec<RoaringBitmap>,
}

impl MembershipIndex {
    pub fn with_domain_count(n: u64) -> Self {
        Self {
            bitmaps: vec![RoaringBitmap::new(); n as usize],
        }
    }

    /// Grow to cover at least `domain_id`, used by incremental builds
    /// when new domains were appended to the dictionary (§4.7 Build).
    pub fn ensure_len(&mut self, len: u64) {
        if (len as usize) > self.bitmaps.len() {
            self.bitmaps.resize(len as usize, RoaringBitmap::new());
        }
    }

    pub fn add(&mut self, domain_id: DomainId, dataset_id: DatasetId) {
        self.ensure_len(domain_id.0 + 1);
        self.bitmaps[domain_id.0 as usize].insert(dataset_id.0);
    }

    pub fn datasets_of(&self, domain_id: DomainId) -> Vec<DatasetId> {
        match self.bitmaps.get(domain_id.0 as usize) {
            Some(bitmap) => bitmap.iter().map(DatasetId).collect(),
            None => Vec::new(),
        }
    }

    pub fn cardinality(&self, domain_id: DomainId) -> u64 {
        self.bitmaps
            .get(domain_id.0 as usize)
            .map_or(0, RoaringBitmap::len)
    }

    pub fn domain_count(&self) -> u64 {
        self.bitmaps.len() as u64
    }

    pub fn serialise(&self) -> Vec<u8> {
        let mut blobs = Vec::with_capacity(self.bitmaps.len());
        for bitmap in &self.bitmaps {
            let mut blob = Vec::new();
            bitmap
                .serialize_into(&mut blob)
                .expect("writing to a Vec cannot fail");
            blobs.push(blob);
        }

        let mut buffer = WriteCursor::default();
        write_header(&mut buffer, MAGIC, VERSION);
        buffer.write_u64(blobs.len() as u64);
        let index_offset_pos = buffer.index();
        buffer.write_u64(0); // patched below

        let mut offsets = Vec::with_capacity(blobs.len());
        for blob in &blobs {
            offsets.push((buffer.index() as u64, blob.len() as u32));
            buffer.write_bytes(blob);
        }

        let index_offset = buffer.index() as u64;
        for (start, len) in offsets {
            buffer.write_u64(start);
            buffer.write_u32(len);
        }

        buffer.patch_u32(index_offset_pos, (index_offset >> 32) as u32);
        buffer.patch_u32(index_offset_pos + 4, index_offset as u32);
        buffer.octets
    }

    /// # Errors
    ///
    /// If the magic/version header is wrong or the artifact is truncated.
    pub fn parse(bytes: &[u8]) -> Result<Self, CursorError> {
        let mut cursor = ReadCursor::new(bytes);
        cursor.expect_header(MAGIC, VERSION)?;
        let n_domains = cursor.next_u64()?;
        let index_offset = cursor.next_u64()? as usize;

        if index_offset > bytes.len() {
            return Err(CursorError::Truncated);
        }

        let mut index_cursor = ReadCursor::new(&bytes[index_offset..]);
        let mut bitmaps = Vec::with_capacity(n_domains as usize);
        for _ in 0..n_domains {
            let start = index_cursor.next_u64()? as usize;
            let len = index_cursor.next_u32()? as usize;
            let blob = bytes
                .get(start..start + len)
                .ok_or(CursorError::Truncated)?;
            let bitmap = RoaringBitmap::deserialize_from(blob)
                .map_err(|_| CursorError::Truncated)?;
            bitmaps.push(bitmap);
        }

        Ok(Self { bitmaps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_membership() {
        let mut index = MembershipIndex::with_domain_count(3);
        index.add(DomainId(0), DatasetId(0));
        index.add(DomainId(0), DatasetId(1));
        index.add(DomainId(2), DatasetId(5));

        let bytes = index.serialise();
        let parsed = MembershipIndex::parse(&bytes).unwrap();

        assert_eq!(parsed.domain_count(), 3);
        let mut d0 = parsed.datasets_of(DomainId(0));
        d0.sort();
        assert_eq!(d0, vec![DatasetId(0), DatasetId(1)]);
        assert_eq!(parsed.datasets_of(DomainId(1)), Vec::<DatasetId>::new());
        assert_eq!(parsed.datasets_of(DomainId(2)), vec![DatasetId(5)]);
        assert_eq!(parsed.cardinality(DomainId(0)), 2);
    }

    #[test]
    fn unknown_domain_id_returns_empty_not_panic() {
        let index = MembershipIndex::with_domain_count(1);
        assert_eq!(index.datasets_of(DomainId(99)), Vec::<DatasetId>::new());
    }
}
