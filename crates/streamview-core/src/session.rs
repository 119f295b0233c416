//! Opaque session identifiers.
//!
//! A session id is minted on initial page load and travels back with every
//! stream attach and event submission. It is 32 random bytes, hex-encoded,
//! so it is unguessable and safe to embed in URLs and attributes.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind a freshly minted id.
pub const TOKEN_BYTES: usize = 32;

/// Longest id accepted from a client.
const MAX_LEN: usize = 128;

/// Errors when parsing a client-supplied session id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionIdError {
    /// The id was empty.
    #[error("session id is empty")]
    Empty,

    /// The id was longer than any id this server mints.
    #[error("session id is too long ({0} bytes)")]
    TooLong(usize),

    /// The id contained characters outside `[A-Za-z0-9_-]`.
    #[error("session id contains invalid characters")]
    InvalidCharacters,
}

/// Opaque, unguessable session token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Mint a new random id.
    pub fn generate() -> Self {
        let mut bytes = [0_u8; TOKEN_BYTES];
        rand::rng().fill(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Validate a client-supplied id.
    ///
    /// Only the shape is checked; whether a session exists is the
    /// directory's business.
    pub fn parse(raw: &str) -> Result<Self, SessionIdError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if raw.len() > MAX_LEN {
            return Err(SessionIdError::TooLong(raw.len()));
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(SessionIdError::InvalidCharacters);
        }
        Ok(Self(raw.to_owned()))
    }

    /// Borrow the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_long_and_distinct() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_eq!(a.as_str().len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn generated_ids_parse_back() {
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(id.as_str()), Ok(id));
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert_eq!(SessionId::parse("  "), Err(SessionIdError::Empty));
        assert_eq!(
            SessionId::parse("abc/../def"),
            Err(SessionIdError::InvalidCharacters)
        );
        assert!(matches!(
            SessionId::parse(&"a".repeat(200)),
            Err(SessionIdError::TooLong(200))
        ));
    }
}
