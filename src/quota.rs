//! Free-tier deletion quota

use serde::{Deserialize, Serialize};

/// Deletions allowed before the pro unlock is required
pub const FREE_DELETE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub free_used_count: u32,
    pub is_pro_unlocked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allow,
    /// The batch would exceed the free limit; route to the paywall
    Deny,
}

/// Decides whether a whole batch may be deleted. Batches are never truncated.
pub fn evaluate(state: &QuotaState, batch_size: usize) -> QuotaDecision {
    if state.is_pro_unlocked {
        return QuotaDecision::Allow;
    }

    let requested = u64::from(state.free_used_count) + batch_size as u64;
    if requested <= u64::from(FREE_DELETE_LIMIT) {
        QuotaDecision::Allow
    } else {
        QuotaDecision::Deny
    }
}

/// Records a successful deletion, clamped to the free limit. Pro usage is not counted.
pub fn apply_usage(state: &QuotaState, deleted_count: usize) -> QuotaState {
    if state.is_pro_unlocked {
        return *state;
    }

    let used = u64::from(state.free_used_count) + deleted_count as u64;
    QuotaState {
        free_used_count: used.min(u64::from(FREE_DELETE_LIMIT)) as u32,
        is_pro_unlocked: false,
    }
}

/// Free deletions left, or `None` when unlimited
pub fn remaining(state: &QuotaState) -> Option<u32> {
    if state.is_pro_unlocked {
        None
    } else {
        Some(FREE_DELETE_LIMIT.saturating_sub(state.free_used_count))
    }
}
