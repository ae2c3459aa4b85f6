use goblin_store::GobKey;

/// Render a [`GobKey`] into a Redis key string with the given prefix.
///
/// The format is `prefix:kind:id`.
pub fn render_key(prefix: &str, key: &GobKey) -> String {
    format!("{prefix}:{}", key.canonical())
}

/// Render the soft-deleted form of a key: `prefix:deleted:kind:id`.
pub fn render_deleted_key(prefix: &str, key: &GobKey) -> String {
    format!("{prefix}:{}", key.deleted())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_live_key() {
        assert_eq!(
            render_key("goblin", &GobKey::data("AbCdEf")),
            "goblin:data:AbCdEf"
        );
        assert_eq!(render_key("goblin", &GobKey::token("tok")), "goblin:token:tok");
    }

    #[test]
    fn renders_deleted_key() {
        assert_eq!(
            render_deleted_key("pfx", &GobKey::meta("AbCdEf")),
            "pfx:deleted:meta:AbCdEf"
        );
        assert_eq!(
            render_deleted_key("pfx", &GobKey::id_horde("x")),
            "pfx:deleted:id_horde:x"
        );
    }

    #[test]
    fn live_and_deleted_never_collide() {
        for key in [
            GobKey::data("deleted"),
            GobKey::meta("x"),
            GobKey::horde_list("data"),
        ] {
            assert_ne!(render_key("p", &key), render_deleted_key("p", &key));
        }
    }
}
