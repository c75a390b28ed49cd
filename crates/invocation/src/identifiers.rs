//! Newtype identifiers for the invocation domain.
//!
//! A service name and a method name are both plain strings on the wire, but
//! they are never interchangeable: the encoder renders `<service>.<method>` and
//! the resolver only ever looks up services. Wrapping them keeps the two apart
//! at compile time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty
            /// or only whitespace.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// A registered service name, either fully qualified
    /// (`com.example.user.UserInfoRpcService`) or short (`UserInfoRpcService`).
    ServiceName
}

string_id! {
    /// The name of a method exposed by a service (e.g. `getUserState`).
    MethodName
}

impl ServiceName {
    /// Returns `true` if the name carries a package namespace, i.e. contains a `.`.
    ///
    /// Names without a namespace are looked up in the resolver's short-name map.
    pub fn is_qualified(&self) -> bool {
        self.0.contains('.')
    }

    /// Returns the last dot-separated segment of the name.
    pub fn short_name(&self) -> &str {
        short_name_of(&self.0)
    }
}

/// Returns the last dot-separated segment of `fully_qualified`.
pub(crate) fn short_name_of(fully_qualified: &str) -> &str {
    fully_qualified
        .rsplit('.')
        .next()
        .unwrap_or(fully_qualified)
}

// ---------------------------------------------------------------------------
// UUID-backed identifiers (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single telnet session against one provider.
///
/// Generated fresh for every connection; recorded on every span the session
/// emits so a connect/invoke/close cycle can be correlated in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_rejects_blank() {
        assert!(ServiceName::new("").is_none());
        assert!(ServiceName::new("   ").is_none());
    }

    #[test]
    fn test_short_name_is_last_segment() {
        let qualified = ServiceName::new("com.example.user.UserInfoRpcService").unwrap();
        assert!(qualified.is_qualified());
        assert_eq!(qualified.short_name(), "UserInfoRpcService");

        let short = ServiceName::new("UserInfoRpcService").unwrap();
        assert!(!short.is_qualified());
        assert_eq!(short.short_name(), "UserInfoRpcService");
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new_random(), SessionId::new_random());
    }
}
