#![no_main]

use docseq::{SequenceOptions, Settings};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Only well-formed JSON reaches the options parser
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    // Parsing and resolution must fail cleanly, never panic
    if let Ok(options) = SequenceOptions::from_value(&value) {
        if let Ok(settings) = Settings::resolve(options) {
            assert!(!settings.model.is_empty());
            assert_ne!(settings.field, "_id");
            let _ = settings.initial_count();
        }
    }
});
