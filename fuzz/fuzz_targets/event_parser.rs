#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use veredicto::dataset::{parse_countries, parse_events};

fuzz_target!(|data: &[u8]| {
    // Arbitrary tables must parse or fail with an error, never panic
    let _ = parse_events(Cursor::new(data), "events", ',');
    let _ = parse_countries(Cursor::new(data), "countries", ';');
});
