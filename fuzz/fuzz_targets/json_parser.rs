#![no_main]

use libfuzzer_sys::fuzz_target;
use ndstat::parsers::{JsonlParser, RecordParser};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing errors are fine; we only care about panics or UB.
        let parser = JsonlParser::new();
        if let Ok(record) = parser.parse(input) {
            let _ = record.auth_status();
            let _ = record.length();
        }
    }
});
