//! Columnar Writer (§4.3): buffers normalized rows per partition and
//! flushes each as an append-only `part-NNNNN.parquet` file (one row
//! group per flush, part size bounded by `partition_buffer_size`),
//! dictionary-encoded string columns, ZSTD page compression.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use arrow::array::{StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::{Compression, Encoding, ZstdLevel};
use parquet::file::properties::WriterProperties;

use urlindex_types::error::Error;
use urlindex_types::model::{PartitionKey, RowRecord};

/// `WriterProperties::max_row_group_size` is a row count, not a byte
/// budget. Each flush already writes exactly one row group per batch
/// (`flush` calls `ArrowWriter::write` once), so this only needs to be
/// large enough to never split that single batch; the actual byte
/// budget per part file is enforced upstream by `partition_buffer_size`.
const ROW_GROUP_ROW_COUNT_CAP: usize = 1_000_000;

fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("domain_id", DataType::UInt64, false),
        Field::new("url_id", DataType::UInt64, false),
        Field::new("scheme", DataType::Utf8, false),
        Field::new("host", DataType::Utf8, false),
        Field::new("path_query", DataType::Utf8, false),
        Field::new("domain", DataType::Utf8, false),
    ]))
}

fn writer_properties(compression_level: i32) -> Result<WriterProperties, Error> {
    let level = ZstdLevel::try_new(compression_level)
        .map_err(|e| Error::Io(format!("invalid zstd level {compression_level}: {e}")))?;
    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(level))
        .set_dictionary_enabled(true)
        .set_encoding(Encoding::PLAIN)
        .set_max_row_group_size(ROW_GROUP_ROW_COUNT_CAP)
        .build())
}

fn rows_to_batch(rows: &[RowRecord]) -> Result<RecordBatch, Error> {
    let domain_id: UInt64Array = rows.iter().map(|r| r.domain_id.0).collect();
    let url_id: UInt64Array = rows.iter().map(|r| r.url_id.0).collect();
    let scheme: StringArray = rows.iter().map(|r| r.scheme.as_str()).collect();
    let host: StringArray = rows.iter().map(|r| r.host.as_str()).collect();
    let path_query: StringArray = rows.iter().map(|r| r.path_query.as_str()).collect();
    let domain: StringArray = rows.iter().map(|r| r.domain.as_str()).collect();

    RecordBatch::try_new(
        schema(),
        vec![
            Arc::new(domain_id),
            Arc::new(url_id),
            Arc::new(scheme),
            Arc::new(host),
            Arc::new(path_query),
            Arc::new(domain),
        ],
    )
    .map_err(|e| Error::Io(format!("building record batch: {e}")))
}

/// Rough per-row byte estimate used to decide when a partition buffer
/// has crossed `partition_buffer_size`. Exactness does not matter; only
/// monotonic growth with row size does.
fn estimate_row_bytes(row: &RowRecord) -> usize {
    8 + 8 + row.scheme.len() + row.host.len() + row.path_query.len() + row.domain.len()
}

struct PartitionBuffer {
    rows: Vec<RowRecord>,
    bytes: usize,
    next_part: u32,
}

impl PartitionBuffer {
    fn new(next_part: u32) -> Self {
        Self {
            rows: Vec::new(),
            bytes: 0,
            next_part,
        }
    }
}

/// Process-wide columnar writer. `write_row` buffers; `flush`/
/// `flush_all` finalize. Mirrors the teacher's `SharedCache` in being a
/// thin `Arc<Mutex<..>>` wrapper so one `Writer` can be shared across
/// ingestion tasks.
pub struct Writer {
    columnar_root: PathBuf,
    partition_buffer_size: u64,
    global_buffer_limit: u64,
    compression_level: i32,
    buffers: Mutex<HashMap<PartitionKey, PartitionBuffer>>,
}

impl Writer {
    pub fn new(
        columnar_root: impl Into<PathBuf>,
        partition_buffer_size: u64,
        global_buffer_limit: u64,
        compression_level: i32,
    ) -> Self {
        Self {
            columnar_root: columnar_root.into(),
            partition_buffer_size,
            global_buffer_limit,
            compression_level,
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Buffers `row` under `key`. Flushes `key`'s partition immediately
    /// if it has crossed `partition_buffer_size`, and flushes the
    /// single largest buffer if the writer's total buffered bytes have
    /// crossed `global_buffer_limit` (§4.3 "forced flush of the largest
    /// buffer", mirroring `Cache::prune`'s evict-the-biggest-first
    /// shape applied to buffer selection instead of cache eviction).
    ///
    /// # Errors
    ///
    /// If a forced flush fails to write its file.
    pub fn write_row(&self, key: PartitionKey, row: RowRecord) -> Result<Option<PathBuf>, Error> {
        let mut flushed = None;
        {
            let mut buffers = self.buffers.lock().expect(MUTEX_POISON_MESSAGE);
            let buffer = buffers
                .entry(key.clone())
                .or_insert_with(|| PartitionBuffer::new(0));
            buffer.bytes += estimate_row_bytes(&row);
            buffer.rows.push(row);
        }

        if self.partition_bytes(&key) as u64 >= self.partition_buffer_size {
            flushed = self.flush(&key)?;
        } else if self.total_bytes() as u64 >= self.global_buffer_limit {
            if let Some(largest) = self.largest_partition() {
                if largest != key {
                    self.flush(&largest)?;
                } else {
                    flushed = self.flush(&key)?;
                }
            }
        }

        Ok(flushed)
    }

    fn partition_bytes(&self, key: &PartitionKey) -> usize {
        self.buffers
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .get(key)
            .map_or(0, |b| b.bytes)
    }

    fn total_bytes(&self) -> usize {
        self.buffers
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .values()
            .map(|b| b.bytes)
            .sum()
    }

    fn largest_partition(&self) -> Option<PartitionKey> {
        self.buffers
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .iter()
            .max_by_key(|(_, b)| b.bytes)
            .map(|(k, _)| k.clone())
    }

    /// Finalizes `key`'s buffer (if non-empty) into the next
    /// `part-NNNNN.parquet`. Errors here do not roll back any other
    /// partition's already-finalized files (§4.3).
    ///
    /// # Errors
    ///
    /// If the partition's directory cannot be created or the Parquet
    /// file cannot be written.
    pub fn flush(&self, key: &PartitionKey) -> Result<Option<PathBuf>, Error> {
        let (rows, part_number) = {
            let mut buffers = self.buffers.lock().expect(MUTEX_POISON_MESSAGE);
            match buffers.get_mut(key) {
                Some(buffer) if !buffer.rows.is_empty() => {
                    let rows = std::mem::take(&mut buffer.rows);
                    let part_number = buffer.next_part;
                    buffer.next_part += 1;
                    buffer.bytes = 0;
                    (rows, part_number)
                }
                _ => return Ok(None),
            }
        };

        let dir = self.columnar_root.join(key.relative_dir());
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("part-{part_number:05}.parquet"));

        let batch = rows_to_batch(&rows)?;
        let properties = writer_properties(self.compression_level)?;
        let file = fs::File::create(&path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(properties))
            .map_err(|e| Error::Io(format!("opening parquet writer for {path:?}: {e}")))?;
        writer
            .write(&batch)
            .map_err(|e| Error::Io(format!("writing row group to {path:?}: {e}")))?;
        writer
            .close()
            .map_err(|e| Error::Io(format!("closing parquet writer for {path:?}: {e}")))?;

        Ok(Some(path))
    }

    /// Finalizes every non-empty partition buffer. Used by an explicit
    /// `flush()` call and at the end of a build.
    ///
    /// # Errors
    ///
    /// If any partition's flush fails. Partitions flushed before the
    /// failing one keep their already-written files.
    pub fn flush_all(&self) -> Result<Vec<PathBuf>, Error> {
        let keys: Vec<PartitionKey> = self
            .buffers
            .lock()
            .expect(MUTEX_POISON_MESSAGE)
            .keys()
            .cloned()
            .collect();

        let mut paths = Vec::new();
        for key in keys {
            if let Some(path) = self.flush(&key)? {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

const MUTEX_POISON_MESSAGE: &str =
    "[INTERNAL ERROR] writer mutex poisoned, cannot recover from this - aborting";

#[cfg(test)]
mod tests {
    use super::*;
    use urlindex_types::model::{DatasetId, DomainId, DomainPrefix, UrlId};

    fn row(domain: &str, i: u64) -> RowRecord {
        RowRecord {
            domain_id: DomainId(i),
            url_id: UrlId(i),
            scheme: "https".to_string(),
            host: domain.to_string(),
            path_query: format!("/p{i}"),
            domain: domain.to_string(),
        }
    }

    #[test]
    fn flush_writes_a_parquet_part_and_clears_the_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Writer::new(dir.path(), 1024 * 1024, 10 * 1024 * 1024, 6);
        let key = PartitionKey {
            dataset_id: DatasetId(0),
            domain_prefix: DomainPrefix("ab".to_string()),
        };

        for i in 0..5 {
            writer.write_row(key.clone(), row("example.com", i)).unwrap();
        }

        let path = writer.flush(&key).unwrap().unwrap();
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "part-00000.parquet");

        // second flush with nothing buffered is a no-op
        assert!(writer.flush(&key).unwrap().is_none());
    }

    #[test]
    fn crossing_partition_buffer_size_flushes_automatically() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Writer::new(dir.path(), 64, 10 * 1024 * 1024, 6);
        let key = PartitionKey {
            dataset_id: DatasetId(1),
            domain_prefix: DomainPrefix("cd".to_string()),
        };

        let mut flushed = false;
        for i in 0..20 {
            if writer.write_row(key.clone(), row("example.org", i)).unwrap().is_some() {
                flushed = true;
            }
        }
        assert!(flushed);
    }
}
