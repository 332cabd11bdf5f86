// src/engine/retry.rs

//! Delay applied before a failed task is handed out again.

use std::time::Duration;

/// Retry delay policy.
///
/// The retry *count* semantics do not depend on this: a task is still
/// attempted exactly `max_retries + 1` times before it fails terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Re-queue immediately.
    #[default]
    None,
    /// Wait `base * 2^(retry_count - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry_count` (1-based).
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Exponential { base, max } => {
                let exponent = retry_count.saturating_sub(1).min(31);
                base.checked_mul(1u32 << exponent)
                    .unwrap_or(max)
                    .min(max)
            }
        }
    }
}
