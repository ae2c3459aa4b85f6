pub mod codec;
pub mod error;
pub mod gob;
pub mod limits;
pub mod sniff;
pub mod ttl;

pub use codec::{CURRENT_SCHEMA_VERSION, decode_metadata, encode_metadata};
pub use error::CodecError;
pub use gob::{Gob, GobMetadata, HordeEntry};
pub use limits::{DEFAULT_MAX_OBJECT_SIZE, StoreLimits, bounded_append};
pub use sniff::{SNIFF_LEN, detect_content_type};
pub use ttl::{MIB, TtlPolicy};
