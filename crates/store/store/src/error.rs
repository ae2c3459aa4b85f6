use goblin_core::CodecError;
use thiserror::Error;

/// Errors from data store operations.
///
/// A missing gob, token or horde is never an error; lookups report it as
/// `Ok(None)` or an empty collection.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}
