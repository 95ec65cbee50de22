#![no_main]
use libfuzzer_sys::fuzz_target;

use urlindex_types::format::mphf::MphfTable;

fuzz_target!(|data: &[u8]| {
    if let Ok(table) = MphfTable::parse(data) {
        let serialised = table.serialise();
        let reparsed = MphfTable::parse(&serialised).unwrap();

        assert_eq!(table.domain_count(), reparsed.domain_count());
        assert_eq!(table.dictionary_hash(), reparsed.dictionary_hash());

        for hash in [0u64, 1, u64::MAX, table.dictionary_hash()] {
            assert_eq!(table.lookup(hash, ""), reparsed.lookup(hash, ""));
        }
    }
});
