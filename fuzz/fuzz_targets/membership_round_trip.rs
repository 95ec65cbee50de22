#![no_main]
use libfuzzer_sys::fuzz_target;

use urlindex_types::format::membership::MembershipIndex;
use urlindex_types::model::DomainId;

fuzz_target!(|data: &[u8]| {
    if let Ok(index) = MembershipIndex::parse(data) {
        let serialised = index.serialise();
        let reparsed = MembershipIndex::parse(&serialised).unwrap();

        assert_eq!(index.domain_count(), reparsed.domain_count());
        for i in 0..index.domain_count() {
            assert_eq!(
                index.datasets_of(DomainId(i)),
                reparsed.datasets_of(DomainId(i))
            );
        }
    }
});
