//! Strongly-typed identifiers.
//!
//! All IDs are validated at construction time and implement common traits.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Macro to define a strongly-typed ID newtype wrapper.
///
/// Generates: struct, `from_string()`, `as_str()`, Display, `Borrow<str>`,
/// Serialize, Deserialize. Optionally generates `new()` (UUID v4) and
/// `Default` if `uuid` flag is passed.
macro_rules! define_id {
    ($name:ident, uuid) => {
        define_id!($name);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: String) -> Result<Self, &'static str> {
                if s.trim().is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty"));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

define_id!(CapabilityId);
define_id!(CallId, uuid);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_id_rejected() {
        assert!(CapabilityId::from_string(String::new()).is_err());
        assert!(CapabilityId::from_string("  ".to_string()).is_err());
    }

    #[test]
    fn test_borrow_allows_str_lookup() {
        let id = CapabilityId::from_string("cap_code".to_string()).unwrap();
        let mut map = HashMap::new();
        map.insert(id.clone(), 1);
        assert_eq!(map.get("cap_code"), Some(&1));
        assert_eq!(id, "cap_code");
    }

    #[test]
    fn test_call_ids_are_unique() {
        assert_ne!(CallId::new(), CallId::new());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = CapabilityId::from_string("cap_docs".to_string()).unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("cap_docs"));
    }
}
