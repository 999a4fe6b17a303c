#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use ndstat::parallel::{Batcher, ParseErrorPolicy};
use ndstat::parsers::JsonlParser;
use ndstat::{CancelToken, RecordSource};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let batch_size = (data[0] as usize % 16) + 1;
    let source = RecordSource::from_reader(
        Cursor::new(data[1..].to_vec()),
        Box::new(JsonlParser::new()),
        CancelToken::new(),
    );

    for batch in Batcher::new(source, batch_size, ParseErrorPolicy::Skip) {
        let batch = match batch {
            Ok(batch) => batch,
            Err(_) => return,
        };
        assert!(!batch.is_empty());
        assert!(batch.len() <= batch_size);
    }
});
