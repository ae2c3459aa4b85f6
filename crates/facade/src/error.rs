use goblin_store::StoreError;

use crate::generator::Namespace;

/// Errors returned by [`GobStore`](crate::GobStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum GobError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("gob of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("invalid gob settings: {0}")]
    InvalidSettings(String),

    #[error("no free {namespace} found after {attempts} attempts")]
    Exhausted { namespace: Namespace, attempts: u32 },
}
