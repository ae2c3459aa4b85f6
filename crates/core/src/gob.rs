use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::CURRENT_SCHEMA_VERSION;
use crate::sniff::detect_content_type;

/// Metadata stored alongside every gob payload.
///
/// Everything here is fixed at creation time. Appends grow the payload but
/// never rewrite the metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GobMetadata {
    /// Public identifier used in URLs.
    pub id: String,
    /// Private token granting delete rights over `id`.
    pub token: String,
    /// Textual address of the uploading client, kept for abuse tracing.
    pub source_ip: String,
    /// When the gob was created.
    pub created_at: DateTime<Utc>,
    /// MIME type sniffed from the first bytes of the payload.
    pub content_type: String,
    /// Record format version, see [`CURRENT_SCHEMA_VERSION`].
    pub schema_version: u32,
}

impl GobMetadata {
    /// Build metadata for a fresh upload, sniffing the content type from `data`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        token: impl Into<String>,
        source_ip: impl Into<String>,
        data: &[u8],
    ) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
            source_ip: source_ip.into(),
            created_at: Utc::now(),
            content_type: detect_content_type(data).to_owned(),
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}

/// A stored gob: payload plus metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gob {
    pub metadata: GobMetadata,
    pub data: Bytes,
}

impl Gob {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One member of a horde listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HordeEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
}
