use std::fmt;

use rand_core::{OsRng, RngCore};
use tracing::debug;

use goblin_store::{DataStore, StoreError};

use crate::error::GobError;

/// Characters ids and tokens are drawn from: ASCII letters, no digits.
pub const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Which uniqueness domain a generated string must be free in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Id,
    Token,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Token => "token",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Random string of `len` characters, one OS random byte per character
/// mapped onto [`ALPHABET`] by remainder.
pub fn random_string(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| char::from(ALPHABET[usize::from(*b) % ALPHABET.len()]))
        .collect()
}

/// Draws ids and tokens that are free in the backend at the time of the
/// check.
///
/// There is no in-process record of issued strings, so two callers can still
/// draw the same one; the store's write refuses the loser.
pub struct Generator<'a> {
    store: &'a dyn DataStore,
    max_attempts: u32,
}

impl<'a> Generator<'a> {
    pub fn new(store: &'a dyn DataStore, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    pub async fn new_id(&self, len: usize) -> Result<String, GobError> {
        self.draw(Namespace::Id, len).await
    }

    pub async fn new_token(&self, len: usize) -> Result<String, GobError> {
        self.draw(Namespace::Token, len).await
    }

    async fn draw(&self, namespace: Namespace, len: usize) -> Result<String, GobError> {
        for attempt in 1..=self.max_attempts {
            let candidate = random_string(len);
            if !self.taken(namespace, &candidate).await? {
                return Ok(candidate);
            }
            debug!(%namespace, attempt, "generated value already taken");
        }
        Err(GobError::Exhausted {
            namespace,
            attempts: self.max_attempts,
        })
    }

    async fn taken(&self, namespace: Namespace, candidate: &str) -> Result<bool, StoreError> {
        match namespace {
            Namespace::Id => self.store.id_exists(candidate).await,
            Namespace::Token => self.store.token_exists(candidate).await,
        }
    }
}
