//! Byte encoding for [`GobMetadata`] records.
//!
//! Metadata is stored as JSON next to the raw payload. The `schema_version`
//! field lets readers reject records written by a newer release instead of
//! misinterpreting them.

use crate::error::CodecError;
use crate::gob::GobMetadata;

/// Schema version written by this release.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Encode a metadata record for storage.
pub fn encode_metadata(meta: &GobMetadata) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(meta).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a stored metadata record.
///
/// Records with a schema version newer than [`CURRENT_SCHEMA_VERSION`] are
/// rejected.
pub fn decode_metadata(bytes: &[u8]) -> Result<GobMetadata, CodecError> {
    let meta: GobMetadata =
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
    if meta.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: meta.schema_version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_what_it_encodes() {
        let meta = GobMetadata::new("AbCdEf", "QwErTyUiOpAsDfGh", "192.0.2.7", b"hello");
        let bytes = encode_metadata(&meta).unwrap();
        let back = decode_metadata(&bytes).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn rejects_future_schema_version() {
        let mut meta = GobMetadata::new("AbCdEf", "QwErTyUiOpAsDfGh", "192.0.2.7", b"hello");
        meta.schema_version = CURRENT_SCHEMA_VERSION + 1;
        let bytes = encode_metadata(&meta).unwrap();
        let err = decode_metadata(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedVersion { found, .. } if found == CURRENT_SCHEMA_VERSION + 1
        ));
    }

    #[test]
    fn rejects_garbage() {
        let err = decode_metadata(b"\x00\x01not json").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
