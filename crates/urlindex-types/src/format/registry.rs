//! File registry artifact: `file_id -> (dataset_id, domain_prefix,
//! relative_path)`, tabular and compressed (§4.6). `FREG` is not one of
//! the four magics spec.md names explicitly, but follows the same
//! header shape as the rest of this module for a uniform loader.

use crate::format::cursor::{write_header, CursorError, ReadCursor, WriteCursor};
use crate::model::{DatasetId, DomainPrefix, FileId, FileRegistryEntry};

pub const MAGIC: &[u8; 4] = b"FREG";
pub const VERSION: u32 = 1;

#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    entries: Vec<FileRegistryEntry>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, assigning `file_id = max_id + 1` (§4.6 Build,
    /// incremental case: previous entries keep their IDs).
    pub fn append(&mut self, dataset_id: DatasetId, domain_prefix: DomainPrefix, relative_path: String) -> FileId {
        let file_id = FileId(self.entries.iter().map(|e| e.file_id.0 + 1).max().unwrap_or(0));
        self.entries.push(FileRegistryEntry {
            file_id,
            dataset_id,
            domain_prefix,
            relative_path,
        });
        file_id
    }

    pub fn by_id(&self, file_id: FileId) -> Option<&FileRegistryEntry> {
        self.entries.iter().find(|e| e.file_id == file_id)
    }

    pub fn by_path(&self, relative_path: &str) -> Option<&FileRegistryEntry> {
        self.entries.iter().find(|e| e.relative_path == relative_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRegistryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn serialise(&self) -> Vec<u8> {
        let mut buffer = WriteCursor::default();
        write_header(&mut buffer, MAGIC, VERSION);
        buffer.write_u64(self.entries.len() as u64);
        for entry in &self.entries {
            buffer.write_u32(entry.file_id.0);
            buffer.write_u32(entry.dataset_id.0);
            buffer.write_str(&entry.domain_prefix.0);
            buffer.write_str(&entry.relative_path);
        }
        buffer.octets
    }

    /// # Errors
    ///
    /// If the magic/version header is wrong or the artifact is truncated.
    pub fn parse(bytes: &[u8]) -> Result<Self, CursorError> {
        let mut cursor = ReadCursor::new(bytes);
        cursor.expect_header(MAGIC, VERSION)?;
        let count = cursor.next_u64()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let file_id = FileId(cursor.next_u32()?);
            let dataset_id = DatasetId(cursor.next_u32()?);
            let domain_prefix = DomainPrefix(cursor.next_str()?);
            let relative_path = cursor.next_str()?;
            entries.push(FileRegistryEntry {
                file_id,
                dataset_id,
                domain_prefix,
                relative_path,
            });
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_sequential_ids_and_keeps_prior_ones() {
        let mut registry = FileRegistry::new();
        let a = registry.append(DatasetId(0), DomainPrefix("ab".to_string()), "a.parquet".to_string());
        let b = registry.append(DatasetId(0), DomainPrefix("cd".to_string()), "b.parquet".to_string());
        assert_eq!(a, FileId(0));
        assert_eq!(b, FileId(1));

        let bytes = registry.serialise();
        let mut reloaded = FileRegistry::parse(&bytes).unwrap();
        let c = reloaded.append(DatasetId(1), DomainPrefix("ef".to_string()), "c.parquet".to_string());
        assert_eq!(c, FileId(2));
        assert_eq!(reloaded.by_id(FileId(0)).unwrap().relative_path, "a.parquet");
        assert_eq!(reloaded.by_path("b.parquet").unwrap().file_id, FileId(1));
    }

    #[test]
    fn round_trips_empty_registry() {
        let registry = FileRegistry::new();
        let bytes = registry.serialise();
        let parsed = FileRegistry::parse(&bytes).unwrap();
        assert!(parsed.is_empty());
    }
}
