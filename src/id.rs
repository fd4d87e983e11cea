//! ID generation utilities for Symposium
//!
//! Provides functions for generating identifiers for conversations, messages and requests.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a prefixed unique ID
///
/// Format: `{prefix}-{timestamp_ms}-{random_hex}`
/// Example: `msg-1738300800123-a1b2c3d4`
pub fn generate_id(prefix: &str) -> String {
    let random: u32 = rand::rng().random();
    format!("{}-{}-{:08x}", prefix, now_ms(), random)
}

/// Generate a conversation ID
pub fn generate_conversation_id() -> String {
    generate_id("conv")
}

/// Generate a message ID
pub fn generate_message_id() -> String {
    generate_id("msg")
}

/// Generate a queued request ID
pub fn generate_request_id() -> String {
    generate_id("req")
}
