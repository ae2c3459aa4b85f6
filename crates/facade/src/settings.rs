use serde::{Deserialize, Serialize};

use goblin_core::{DEFAULT_MAX_OBJECT_SIZE, StoreLimits, TtlPolicy};

use crate::error::GobError;

/// Everything [`GobStore::configure`](crate::GobStore::configure) can swap at
/// runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GobSettings {
    /// Backend address. Ignored by backends without one.
    pub address: String,
    pub id_length: usize,
    pub token_length: usize,
    /// Largest upload accepted by `put_gob`, and the append window.
    pub max_object_size: u64,
    /// Draws per id or token, and full upload retries, before giving up.
    pub max_attempts: u32,
    pub ttl: TtlPolicy,
}

impl GobSettings {
    /// Reject settings no upload could succeed under.
    pub fn validate(&self) -> Result<(), GobError> {
        if self.id_length == 0 || self.token_length == 0 {
            return Err(GobError::InvalidSettings(
                "id_length and token_length must be at least 1".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(GobError::InvalidSettings(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The slice of settings the data store applies.
    pub fn limits(&self) -> StoreLimits {
        StoreLimits {
            max_object_size: self.max_object_size,
            ttl: self.ttl,
        }
    }
}

impl Default for GobSettings {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:6379"),
            id_length: 6,
            token_length: 16,
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            max_attempts: 8,
            ttl: TtlPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use goblin_core::MIB;

    use super::*;

    #[test]
    fn default_values() {
        let settings = GobSettings::default();
        assert_eq!(settings.id_length, 6);
        assert_eq!(settings.token_length, 16);
        assert_eq!(settings.max_object_size, 10 * MIB);
        assert_eq!(settings.max_attempts, 8);
        assert!(settings.token_length > settings.id_length);
    }

    #[test]
    fn defaults_are_valid() {
        assert!(GobSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_attempts_rejected() {
        let settings = GobSettings {
            max_attempts: 0,
            ..GobSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(GobError::InvalidSettings(_))
        ));
    }

    #[test]
    fn zero_length_rejected() {
        let settings = GobSettings {
            token_length: 0,
            ..GobSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn limits_mirror_settings() {
        let settings = GobSettings {
            max_object_size: 42,
            ..GobSettings::default()
        };
        let limits = settings.limits();
        assert_eq!(limits.max_object_size, 42);
        assert_eq!(limits.ttl, settings.ttl);
    }
}
