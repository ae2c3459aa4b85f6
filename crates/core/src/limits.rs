use serde::{Deserialize, Serialize};

use crate::ttl::{MIB, TtlPolicy};

/// Largest payload a single gob may hold.
pub const DEFAULT_MAX_OBJECT_SIZE: u64 = 10 * MIB;

/// Runtime-adjustable limits shared by every data store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLimits {
    /// Upper bound on payload size; appends past it slide the window.
    pub max_object_size: u64,
    pub ttl: TtlPolicy,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            ttl: TtlPolicy::default(),
        }
    }
}

/// Compute the payload that results from appending `chunk` to `current`
/// while keeping at most `max` bytes.
///
/// The oldest bytes are dropped first; the newest `max` bytes of
/// `current ++ chunk` survive in order.
pub fn bounded_append(current: &[u8], chunk: &[u8], max: usize) -> Vec<u8> {
    let total = current.len() + chunk.len();
    let drop = total.saturating_sub(max);
    let mut out = Vec::with_capacity(total - drop);
    if drop < current.len() {
        out.extend_from_slice(&current[drop..]);
        out.extend_from_slice(chunk);
    } else {
        out.extend_from_slice(&chunk[drop - current.len()..]);
    }
    out
}
