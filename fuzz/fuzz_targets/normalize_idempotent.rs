#![no_main]
use libfuzzer_sys::fuzz_target;

use urlindex_core::normalize::normalize;

fuzz_target!(|raw: &str| {
    if let Ok(canonical) = normalize(raw) {
        let reconstructed = canonical.reconstruct();
        let again = normalize(&reconstructed).expect("a reconstructed canonical URL must still normalize");
        assert_eq!(canonical, again);
    }
});
