#![no_main]
use libfuzzer_sys::fuzz_target;

use urlindex_types::format::registry::FileRegistry;

fuzz_target!(|data: &[u8]| {
    if let Ok(registry) = FileRegistry::parse(data) {
        let serialised = registry.serialise();
        let reparsed = FileRegistry::parse(&serialised).unwrap();
        assert_eq!(registry.iter().collect::<Vec<_>>(), reparsed.iter().collect::<Vec<_>>());
    }
});
