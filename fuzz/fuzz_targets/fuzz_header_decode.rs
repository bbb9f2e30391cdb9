#![no_main]
use heapfile_rs::HeaderStore;
use libfuzzer_sys::fuzz_target;

// Arbitrary sidecar bytes must decode or fail, never panic
fuzz_target!(|data: &[u8]| {
    if let Ok(directory) = HeaderStore::decode(data) {
        let encoded = HeaderStore::encode(&directory).unwrap();
        assert_eq!(encoded, data);
    }
});
