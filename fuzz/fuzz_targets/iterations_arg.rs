#![no_main]

use libfuzzer_sys::fuzz_target;
use vmprobe::cli::parse_iterations;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Accepted values are always positive
        if let Ok(value) = parse_iterations(input) {
            assert!(value > 0);
        }
    }
});
