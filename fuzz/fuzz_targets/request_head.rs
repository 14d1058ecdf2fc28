#![no_main]

use brokenwire::RequestHead;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = RequestHead::from_request_line(data);
    let _ = RequestHead::try_parse(data);
});
