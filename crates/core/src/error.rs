use thiserror::Error;

/// Errors raised while encoding or decoding a stored metadata record.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("metadata encoding failed: {0}")]
    Encode(String),

    #[error("metadata decoding failed: {0}")]
    Decode(String),

    #[error("unsupported metadata schema version {found} (newest known is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}
