//! Strongly-typed identifiers.
//!
//! Request ids correlate frames on one connection, call ids pair a tool call
//! event with its result, and tool names key the registry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines a string newtype with `from_string()`, `as_str()` and Display.
///
/// The `uuid` form also generates `new()` (UUID v4) and `Default`.
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
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: String) -> Result<Self, String> {
                if s.is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty").to_string());
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id!(RequestId, uuid);
define_id!(SessionId, uuid);
define_id!(CallId, uuid);
define_id!(ToolName);

impl ToolName {
    /// Longest name function-calling models reliably accept.
    pub const MAX_LEN: usize = 64;

    /// A tool name: ASCII letters, digits, `_` or `-`, at most [`Self::MAX_LEN`].
    pub fn parse(s: impl Into<String>) -> Result<Self, String> {
        let name = Self::from_string(s.into())?;
        if name.0.len() > Self::MAX_LEN {
            return Err(format!("tool name longer than {} bytes: {}", Self::MAX_LEN, name));
        }
        if let Some(c) = name
            .0
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(format!("tool name {:?} contains {:?}", name.0, c));
        }
        Ok(name)
    }
}
