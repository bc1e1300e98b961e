#![no_main]

use covdelta_adapters_coverage::{DEFAULT_SUITE, parse_resultset};
use covdelta_domain::summarize;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data)
        && let Ok(files) = parse_resultset(text, DEFAULT_SUITE)
    {
        // Every decoded file summarizes to a percentage within 0-100.
        for pct in summarize(&files).values() {
            assert!((0.0..=100.0).contains(pct));
        }
    }
});
