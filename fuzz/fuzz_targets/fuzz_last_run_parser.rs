#![no_main]

use covdelta_adapters_coverage::parse_last_run;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data)
        && let Ok(pct) = parse_last_run(text)
    {
        assert!((0.0..=100.0).contains(&pct));
    }
});
