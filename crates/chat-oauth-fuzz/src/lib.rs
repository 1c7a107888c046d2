//! Fuzzing library for chat-oauth.
//!
//! Targets cover the parsers that see untrusted request input: scope
//! strings, PKCE parameters and token request bodies.
//!
//! # Usage
//!
//! ```bash
//! cd crates/chat-oauth-fuzz
//! cargo +nightly fuzz run fuzz_scope_parse -- -max_total_time=60
//! ```

pub use chat_oauth::{pkce, scope};
