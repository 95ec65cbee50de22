//! Domain dictionary artifact: ordered, append-only list of distinct
//! domain strings. Position `i` is `domain_id = i` (§4.4). Like the
//! file registry, `DDIC` is our own magic, used for uniform headers
//! across this module rather than anything spec.md names explicitly.

use crate::format::cursor::{write_header, CursorError, ReadCursor, WriteCursor};
use crate::model::DomainId;
use std::io::{self, Read, Write};

pub const MAGIC: &[u8; 4] = b"DDIC";
pub const VERSION: u32 = 1;

/// Failure parsing or decompressing a dictionary artifact.
#[derive(Debug)]
pub enum DictionaryError {
    Cursor(CursorError),
    Decompress(io::Error),
    InvalidUtf8,
}

impl std::fmt::Display for DictionaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DictionaryError::Cursor(e) => write!(f, "{e}"),
            DictionaryError::Decompress(e) => write!(f, "decompression failed: {e}"),
            DictionaryError::InvalidUtf8 => write!(f, "dictionary body is not valid UTF-8"),
        }
    }
}

impl std::error::Error for DictionaryError {}

impl From<CursorError> for DictionaryError {
    fn from(err: CursorError) -> Self {
        DictionaryError::Cursor(err)
    }
}

/// The ordered, append-only domain dictionary held in memory by the
/// builder and the query service alike.
#[derive(Debug, Clone, Default)]
pub struct DomainDictionary {
    domains: Vec<String>,
}

impl DomainDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sorted(domains: Vec<String>) -> Self {
        Self { domains }
    }

    /// Appends `new_domains` to the end in the order given, without
    /// touching any existing entry's position (§4.4 invariant: "do not
    /// re-sort"). Callers pass domains in sorted order for a full
    /// build, or the novel-domains-only set for an incremental one.
    pub fn append(&mut self, new_domains: impl IntoIterator<Item = String>) {
        self.domains.extend(new_domains);
    }

    pub fn len(&self) -> u64 {
        self.domains.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn get(&self, domain_id: DomainId) -> Option<&str> {
        self.domains.get(domain_id.0 as usize).map(String::as_str)
    }

    /// Linear scan for the `domain_id` of `domain`. Only used by full
    /// rebuilds computing the novel-domain set; the hot query path
    /// resolves via the MPHF and verifies with [`DomainDictionary::get`].
    pub fn find(&self, domain: &str) -> Option<DomainId> {
        self.domains
            .iter()
            .position(|d| d == domain)
            .map(|i| DomainId(i as u64))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    /// Serialises as newline-delimited domains, ZSTD-compressed at
    /// `compression_level` (§4.2 default ~6).
    ///
    /// # Errors
    ///
    /// If the ZSTD encoder fails.
    pub fn serialise(&self, compression_level: i32) -> Result<Vec<u8>, DictionaryError> {
        let mut body = String::with_capacity(self.domains.iter().map(String::len).sum::<usize>() + self.domains.len());
        for domain in &self.domains {
            body.push_str(domain);
            body.push('\n');
        }

        let mut encoder = zstd::stream::Encoder::new(Vec::new(), compression_level)
            .map_err(DictionaryError::Decompress)?;
        encoder
            .write_all(body.as_bytes())
            .map_err(DictionaryError::Decompress)?;
        let compressed = encoder.finish().map_err(DictionaryError::Decompress)?;

        let mut buffer = WriteCursor::default();
        write_header(&mut buffer, MAGIC, VERSION);
        buffer.write_u64(self.domains.len() as u64);
        buffer.write_bytes(&compressed);
        Ok(buffer.octets)
    }

    /// # Errors
    ///
    /// If the header is wrong, the ZSTD body is corrupt, or the
    /// decompressed body is not valid UTF-8.
    pub fn parse(bytes: &[u8]) -> Result<Self, DictionaryError> {
        let mut cursor = ReadCursor::new(bytes);
        cursor.expect_header(MAGIC, VERSION)?;
        let expected_count = cursor.next_u64()?;
        let compressed = cursor.next_bytes(cursor.remaining())?;

        let mut decoder = zstd::stream::Decoder::new(compressed).map_err(DictionaryError::Decompress)?;
        let mut body = String::new();
        decoder
            .read_to_string(&mut body)
            .map_err(|_| DictionaryError::InvalidUtf8)?;

        let domains: Vec<String> = body.lines().map(str::to_string).collect();
        debug_assert_eq!(domains.len() as u64, expected_count);
        Ok(Self { domains })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_existing_ids() {
        let mut dict = DomainDictionary::new();
        dict.append(vec!["a.com".to_string(), "b.com".to_string()]);
        assert_eq!(dict.get(DomainId(0)), Some("a.com"));
        assert_eq!(dict.get(DomainId(1)), Some("b.com"));

        dict.append(vec!["c.com".to_string()]);
        assert_eq!(dict.get(DomainId(0)), Some("a.com"));
        assert_eq!(dict.get(DomainId(2)), Some("c.com"));
    }

    #[test]
    fn round_trips_through_compression() {
        let mut dict = DomainDictionary::new();
        dict.append(vec!["a.com".to_string(), "b.com".to_string(), "c.com".to_string()]);

        let bytes = dict.serialise(6).unwrap();
        let parsed = DomainDictionary::parse(&bytes).unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.find("b.com"), Some(DomainId(1)));
        assert_eq!(parsed.find("missing.com"), None);
    }
}
