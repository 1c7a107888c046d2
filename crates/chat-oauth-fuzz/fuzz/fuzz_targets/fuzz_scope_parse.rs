#![no_main]

use chat_oauth::ScopeSet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(set) = ScopeSet::parse(text) {
            // A parsed set must survive formatting unchanged.
            assert_eq!(ScopeSet::parse(&set.to_string()).ok(), Some(set));
        }
    }
});
