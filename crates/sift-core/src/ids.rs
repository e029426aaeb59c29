//! Prefixed identifier minting.
//!
//! IDs are `<prefix>_<uuid v7>` strings. UUIDv7 embeds the creation
//! timestamp, which makes IDs a reasonable tiebreaker when sorting rows
//! that share a `created_at` value.

use uuid::Uuid;

/// Mint a run ID (`run_<uuid>`).
#[must_use]
pub fn run_id() -> String {
    format!("run_{}", Uuid::now_v7())
}

/// Mint a step ID (`step_<uuid>`).
#[must_use]
pub fn step_id() -> String {
    format!("step_{}", Uuid::now_v7())
}

/// Mint an artifact ID (`art_<uuid>`).
#[must_use]
pub fn artifact_id() -> String {
    format!("art_{}", Uuid::now_v7())
}

/// Current UTC timestamp as RFC 3339.
#[must_use]
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
