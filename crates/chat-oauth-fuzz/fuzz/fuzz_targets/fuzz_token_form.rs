#![no_main]

use chat_oauth::grant::TokenRequest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Try to decode arbitrary bytes as a token endpoint form body
    let _ = serde_urlencoded::from_bytes::<TokenRequest>(data);
});
