#![no_main]

use chat_oauth::pkce;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Split into challenge, method and verifier on NUL bytes.
    let mut parts = text.splitn(3, '\0');
    let challenge = parts.next().unwrap_or_default();
    let method = parts.next().unwrap_or_default();
    let verifier = parts.next().unwrap_or_default();
    let _ = pkce::validate(challenge, method, verifier);
});
