//! On-disk binary artifact formats (§4, §6). Every format shares the
//! `WriteCursor`/`ReadCursor` primitives in [`cursor`] and a 4-byte
//! magic + `u32` version header.

pub mod cursor;
pub mod dictionary;
pub mod membership;
pub mod mphf;
pub mod postings;
pub mod registry;

pub use cursor::CursorError;
