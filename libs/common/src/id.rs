use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = huddle_common::id::prefixed_ulid("msg");
/// assert!(id.starts_with("msg_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Marker trait for types that represent a prefixed ID.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const USER: &str = "usr";
    pub const WORKSPACE: &str = "ws";
    pub const CHANNEL: &str = "ch";
    pub const MESSAGE: &str = "msg";
    pub const REACTION: &str = "rxn";
    /// A live client connection (one SSE stream).
    pub const CONNECTION: &str = "conn";
    pub const SUBSCRIPTION: &str = "sub";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_ulid_format() {
        let id = prefixed_ulid(prefix::CHANNEL);
        assert!(id.starts_with("ch_"));
        // ULID is 26 chars, plus prefix + underscore
        assert_eq!(id.len(), 3 + 26);
    }

    #[test]
    fn test_uniqueness() {
        let a = prefixed_ulid("conn");
        let b = prefixed_ulid("conn");
        assert_ne!(a, b);
    }

    #[test]
    fn test_prefixed_id_trait() {
        struct Connection;
        impl PrefixedId for Connection {
            const PREFIX: &'static str = prefix::CONNECTION;
        }
        assert!(Connection::generate().starts_with("conn_"));
    }
}
