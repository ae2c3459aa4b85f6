use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

const DAY: u64 = 24 * 60 * 60;

/// Size-based lifetime policy for stored gobs.
///
/// Small gobs live for `small_object_days`. From one MiB up, the lifetime is
/// `base_days - days_per_mib * size_mib` days (whole MiB, floored), clamped
/// at zero, so large uploads age out quickly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    pub small_object_days: u64,
    pub base_days: u64,
    pub days_per_mib: u64,
    /// How long soft-deleted keys stay recoverable.
    pub deleted_grace_days: u64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            small_object_days: 365,
            base_days: 207,
            days_per_mib: 20,
            deleted_grace_days: 7,
        }
    }
}

impl TtlPolicy {
    /// Lifetime for a payload of `size` bytes.
    pub fn ttl_for(&self, size: u64) -> Duration {
        if size < MIB {
            return days(self.small_object_days);
        }
        let size_mib = size / MIB;
        days(
            self.base_days
                .saturating_sub(self.days_per_mib.saturating_mul(size_mib)),
        )
    }

    /// Grace window applied to soft-deleted keys.
    pub fn deleted_grace(&self) -> Duration {
        days(self.deleted_grace_days)
    }
}

fn days(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(DAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_objects_live_a_year() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl_for(0), days(365));
        assert_eq!(policy.ttl_for(MIB - 1), days(365));
    }

    #[test]
    fn documented_sizes() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl_for(MIB), days(187));
        assert_eq!(policy.ttl_for(5 * MIB), days(107));
        assert_eq!(policy.ttl_for(10 * MIB), days(7));
    }

    #[test]
    fn oversized_clamps_to_zero() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl_for(11 * MIB), Duration::ZERO);
        assert_eq!(policy.ttl_for(u64::MAX), Duration::ZERO);
    }

    #[test]
    fn partial_mebibytes_round_down() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl_for(5 * MIB + MIB / 2), days(107));
    }

    #[test]
    fn monotonic_above_one_mebibyte() {
        let policy = TtlPolicy::default();
        let mut last = policy.ttl_for(MIB);
        for size in (MIB..=12 * MIB).step_by(usize::try_from(MIB / 4).unwrap()) {
            let ttl = policy.ttl_for(size);
            assert!(ttl <= last, "ttl grew at {size} bytes");
            last = ttl;
        }
    }

    #[test]
    fn grace_window_is_a_week() {
        assert_eq!(TtlPolicy::default().deleted_grace(), days(7));
    }
}
