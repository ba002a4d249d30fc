use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::tag::Tag;

/// State persisted by the caller between invocations of one logical
/// operation.
///
/// Completion flags are monotonic: once set they are never cleared within
/// the same logical operation, so every non-idempotent remote call runs at
/// most once no matter how many times the operation is replayed. A missing
/// or empty context deserializes as a fresh one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallbackContext {
    // ── Completion flags ──
    pub policy_updated: bool,
    pub description_updated: bool,
    /// The key was enabled during this operation.
    pub key_enabled: bool,
    /// The key was disabled during this operation.
    pub key_disabled: bool,
    pub rotation_updated: bool,
    pub propagation_complete: bool,
    pub deletion_scheduled: bool,

    // ── Tag listing ──
    pub tag_cursor: Option<String>,
    pub existing_tags: BTreeSet<Tag>,
    pub tags_retrieved: bool,

    /// Update (as opposed to create/delete); selects the propagation delay.
    pub is_update: bool,

    // ── Retry and stabilization counters ──
    /// Attempt number for the retry-filtered step; reset once it succeeds.
    pub retry_attempts: u32,
    /// Polls left before stabilization gives up. `None` until the first
    /// unsuccessful poll.
    pub stabilization_retries_remaining: Option<u32>,
}

impl CallbackContext {
    pub fn new() -> Self {
        Self::default()
    }
}
