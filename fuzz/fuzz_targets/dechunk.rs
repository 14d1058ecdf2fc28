#![no_main]

use brokenwire::Dechunker;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut d = Dechunker::new();
    let mut out = vec![0; data.len()];
    let _ = d.parse_input(data, &mut out);
});
