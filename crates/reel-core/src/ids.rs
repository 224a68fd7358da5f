//! Identifier newtypes.
//!
//! Projects are identified by the integer key of the persistence layer;
//! streaming clients get an opaque random token minted at handshake time.
//! Keeping them as distinct types prevents passing one where the other is
//! expected.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::errors::CoreError;

/// Identifier of a project, the fan-out scope of every event.
///
/// Serialized as a JSON string (`"42"`) to match the envelope's `projectId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectId(i64);

impl ProjectId {
    /// Wrap a raw project key.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw integer key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for ProjectId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl FromStr for ProjectId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| CoreError::InvalidProjectId(s.to_owned()))
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ProjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ProjectIdVisitor;

        impl Visitor<'_> for ProjectIdVisitor {
            type Value = ProjectId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a project id as an integer or a decimal string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ProjectId, E> {
                Ok(ProjectId(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ProjectId, E> {
                i64::try_from(v)
                    .map(ProjectId)
                    .map_err(|_| E::custom("project id out of range"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ProjectId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ProjectIdVisitor)
    }
}

/// Opaque identifier of one streaming connection.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Mint a new client ID from 128 bits of OS randomness (32 hex chars).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for ClientId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
