//! NewType wrappers for strong typing throughout the control plane.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a node name where a runtime handle is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Whether the wrapped string is empty.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Immutable unique identifier generated when a resource is constructed.
    ///
    /// Unlike the (namespace, name) identity, the UID is never reused: a pod
    /// deleted and recreated under the same name receives a fresh UID.
    Uid
);

newtype_string!(
    /// Cluster-unique name of a scheduling target (worker node).
    NodeName
);

newtype_string!(
    /// Opaque identifier returned by the container runtime for a launched pod.
    ///
    /// Only the runtime that issued a handle can interpret it; the control
    /// plane stores it and hands it back for stop/inspect/logs.
    RuntimeHandle
);

impl Uid {
    /// Generate a fresh random UID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
