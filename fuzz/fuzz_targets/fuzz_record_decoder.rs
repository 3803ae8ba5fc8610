//! Fuzz target: `RecordValue::from_bytes` and `parse_triple`
//!
//! Feeds arbitrary flash contents through the record decoder and asserts
//! that every accepted event is within range.
//!
//! cargo fuzz run fuzz_record_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use pilldispenser::persistence::{RecordValue, parse_triple};

fuzz_target!(|data: &[u8]| {
    if let Ok(RecordValue::Text(text)) = RecordValue::from_bytes(data) {
        if let Ok(event) = parse_triple(&text) {
            assert!(event.validate().is_ok(), "parser accepted an invalid event");
        }
    }

    if let Ok(text) = core::str::from_utf8(data) {
        if let Ok(event) = parse_triple(text) {
            assert!(event.hour < 24 && event.minute < 60 && event.quantity > 0);
        }
    }
});
