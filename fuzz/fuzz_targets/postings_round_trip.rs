#![no_main]
use libfuzzer_sys::fuzz_target;

use urlindex_types::format::postings::PostingsShard;

fuzz_target!(|data: (&[u8], &[u8])| {
    let (index_bytes, data_bytes) = data;
    if let Ok(shard) = PostingsShard::parse(index_bytes, data_bytes) {
        let (reindex, redata) = shard.serialise();
        let reparsed = PostingsShard::parse(&reindex, &redata).unwrap();
        assert_eq!(shard.len(), reparsed.len());
    }
});
