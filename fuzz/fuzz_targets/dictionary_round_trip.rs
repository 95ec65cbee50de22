#![no_main]
use libfuzzer_sys::fuzz_target;

use urlindex_types::format::dictionary::DomainDictionary;

fuzz_target!(|data: &[u8]| {
    if let Ok(dict) = DomainDictionary::parse(data) {
        let serialised = dict.serialise(3).unwrap();
        let reparsed = DomainDictionary::parse(&serialised).unwrap();
        assert_eq!(dict.iter().collect::<Vec<_>>(), reparsed.iter().collect::<Vec<_>>());
    }
});
