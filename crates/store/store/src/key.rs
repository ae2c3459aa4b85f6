use serde::{Deserialize, Serialize};

/// The category of a stored key.
///
/// Each category gets its own segment in the rendered key, so identifiers from
/// different categories can never collide even when the raw strings are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Raw gob payload.
    Data,
    /// Encoded [`GobMetadata`](goblin_core::GobMetadata).
    Meta,
    /// Token to id mapping.
    Token,
    /// Ordered list of ids in a horde.
    HordeList,
    /// Per-horde map of id to creation timestamp.
    HordeTimes,
    /// Reverse index from id to the horde holding it.
    IdHorde,
}

impl KeyKind {
    /// Return a string representation of the key kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Meta => "meta",
            Self::Token => "token",
            Self::HordeList => "horde",
            Self::HordeTimes => "horde_ts",
            Self::IdHorde => "id_horde",
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Segment that moves a key into the soft-deleted namespace.
pub const DELETED_SEGMENT: &str = "deleted";

/// Key used to address an entry in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GobKey {
    pub kind: KeyKind,
    pub id: String,
}

impl GobKey {
    /// Create a new key.
    #[must_use]
    pub fn new(kind: KeyKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn data(id: &str) -> Self {
        Self::new(KeyKind::Data, id)
    }

    #[must_use]
    pub fn meta(id: &str) -> Self {
        Self::new(KeyKind::Meta, id)
    }

    #[must_use]
    pub fn token(token: &str) -> Self {
        Self::new(KeyKind::Token, token)
    }

    #[must_use]
    pub fn horde_list(horde: &str) -> Self {
        Self::new(KeyKind::HordeList, horde)
    }

    #[must_use]
    pub fn horde_times(horde: &str) -> Self {
        Self::new(KeyKind::HordeTimes, horde)
    }

    #[must_use]
    pub fn id_horde(id: &str) -> Self {
        Self::new(KeyKind::IdHorde, id)
    }

    /// Return a canonical string representation: `kind:id`
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }

    /// Canonical form of this key once soft-deleted: `deleted:kind:id`
    #[must_use]
    pub fn deleted(&self) -> String {
        format!("{DELETED_SEGMENT}:{}", self.canonical())
    }
}

impl std::fmt::Display for GobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}
