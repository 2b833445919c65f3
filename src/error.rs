//! Error taxonomy.
//!
//! The hot paths (`find`/`get`/`route`/`delete`) never return a fallible
//! `Result`: per the external interface design, contention is resolved by
//! restarting the operation internally, not by bubbling a retryable error up
//! to the caller. `FibError` only covers the handful of genuinely fatal,
//! configuration-time failures — the boolean/Option return values on the
//! data-path are not errors, they are answers.
use thiserror::Error;

use crate::config::HASH_HI_MAX;

/// A fatal, non-retryable failure. These only arise from misconfiguration;
/// once a `Table` is running, internal CAS retries absorb every transient
/// race on their own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FibError {
    /// `Config::hash_order` outside `1..=HASH_HI_MAX`.
    #[error("hash_order must be between 1 and {HASH_HI_MAX}, got {0}")]
    InvalidHashOrder(u32),

    /// `entries_min` was configured larger than `entries_max`.
    #[error("entries_min ({min}) must not exceed entries_max ({max})")]
    InvalidEntryBounds {
        /// Configured lower watermark.
        min: usize,
        /// Configured upper watermark.
        max: usize,
    },

    /// An internal invariant was violated. Surfacing this instead of
    /// panicking lets a caller that wraps the table in its own supervision
    /// tree decide what to do, but it should never actually happen; every
    /// occurrence is a bug in this crate.
    #[error("internal invariant violated: {0}")]
    BrokenInvariant(&'static str),
}
