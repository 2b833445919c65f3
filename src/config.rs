//! Tuning knobs, split out of the hot-path modules the way a config struct
//! stays separate from the table it configures.
use std::time::Duration;

use crate::error::FibError;

/// Default starting bucket-array order (`2^10` buckets).
pub const HASH_DEF_ORDER: u32 = 10;

/// Largest order the bucket array is allowed to grow to.
pub const HASH_HI_MAX: u32 = 24;

/// Number of reservation rows in the hazard fabric, i.e. the maximum number
/// of threads that may have an operation in flight on one table at once.
pub const MAX_THREADS: usize = 32;

/// Default interval between background reclamation sweeps.
pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(30);

/// Load factor above which the bucket array doubles.
const DEFAULT_GROW_FACTOR: usize = 2;

/// Load factor below which the bucket array is eligible to halve.
const DEFAULT_SHRINK_FACTOR: usize = 8;

/// Per-table tuning. `Default` matches the crate's documented constants; every
/// field can be overridden for tests that want to force growth/shrink or
/// reclamation at small scale.
#[derive(Clone, Debug)]
pub struct Config {
    /// Starting `log2` bucket count.
    pub hash_order: u32,
    /// Ceiling on `hash_order`.
    pub hash_hi_max: u32,
    /// Interval the background reclaimer sleeps between sweeps.
    pub reclaim_interval: Duration,
    /// Divisor used to derive `entries_max` from the current bucket count
    /// (`entries_max = buckets * grow_factor`).
    pub grow_factor: usize,
    /// Divisor used to derive `entries_min` from the current bucket count
    /// (`entries_min = buckets / shrink_factor`). Only consulted when
    /// `shrink_enabled` is set.
    pub shrink_factor: usize,
    /// Whether the table is allowed to halve its bucket array when
    /// occupancy drops below `entries_min`. See `DESIGN.md` for why this
    /// defaults to enabled instead of staying dead code.
    pub shrink_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_order: HASH_DEF_ORDER,
            hash_hi_max: HASH_HI_MAX,
            reclaim_interval: DEFAULT_RECLAIM_INTERVAL,
            grow_factor: DEFAULT_GROW_FACTOR,
            shrink_factor: DEFAULT_SHRINK_FACTOR,
            shrink_enabled: true,
        }
    }
}

impl Config {
    /// Rejects configurations that would violate a structural invariant
    /// before any allocation happens.
    pub fn validate(&self) -> Result<(), FibError> {
        if self.hash_order == 0 || self.hash_order > self.hash_hi_max {
            return Err(FibError::InvalidHashOrder(self.hash_order));
        }
        let buckets = 1usize << self.hash_order;
        let max = buckets.saturating_mul(self.grow_factor);
        let min = if self.shrink_enabled {
            buckets / self.shrink_factor.max(1)
        } else {
            0
        };
        if min > max {
            return Err(FibError::InvalidEntryBounds { min, max });
        }
        Ok(())
    }
}
