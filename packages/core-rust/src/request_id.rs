//! Short request identifiers used to correlate logs and responses.
//!
//! Identifiers are 13 base-36 digits (`[0-9a-z]`), drawn uniformly from the
//! thread-local RNG. They are unique with high probability, not guaranteed.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ContextError;

/// Context key under which the request identifier is stored.
pub const REQUEST_ID_KEY: &str = "requestId";

/// Length of a generated identifier.
pub const REQUEST_ID_LEN: usize = 13;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque per-request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(String);

impl RequestId {
    /// Generates a fresh identifier of [`REQUEST_ID_LEN`] base-36 characters.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..REQUEST_ID_LEN)
            .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
            .collect();
        Self(id)
    }

    /// Parses an identifier, accepting 1 to [`REQUEST_ID_LEN`] characters
    /// from `[0-9a-z]`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidRequestId`] for empty, overlong, or
    /// non-base-36 input.
    pub fn parse(value: &str) -> Result<Self, ContextError> {
        let valid = !value.is_empty()
            && value.len() <= REQUEST_ID_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase());

        if valid {
            Ok(Self(value.to_owned()))
        } else {
            Err(ContextError::InvalidRequestId {
                value: value.to_owned(),
            })
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for RequestId {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RequestId {
    type Error = ContextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

impl From<RequestId> for Value {
    fn from(id: RequestId) -> Self {
        Value::String(id.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generated_id_is_lowercase_base36_of_fixed_length() {
        let id = RequestId::generate();
        assert_eq!(id.as_str().len(), REQUEST_ID_LEN);
        assert!(id
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }

    #[test]
    fn generated_ids_do_not_repeat_in_practice() {
        let ids: HashSet<_> = (0..1_000).map(|_| RequestId::generate()).collect();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn generated_id_round_trips_through_parse() {
        let id = RequestId::generate();
        assert_eq!(RequestId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn parse_accepts_short_ids() {
        // Shorter ids are legal: a base-36 rendering may drop leading digits.
        let id: RequestId = "k3j9".parse().unwrap();
        assert_eq!(id.to_string(), "k3j9");
    }

    #[test]
    fn parse_rejects_bad_input() {
        for bad in ["", "ABC", "abc-def", "0123456789abcd", "spa ce"] {
            assert_eq!(
                RequestId::parse(bad),
                Err(ContextError::InvalidRequestId {
                    value: bad.to_string()
                }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = RequestId::parse("abc123").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    }

    #[test]
    fn deserialize_validates() {
        let ok: RequestId = serde_json::from_str("\"z9\"").unwrap();
        assert_eq!(ok.as_str(), "z9");
        assert!(serde_json::from_str::<RequestId>("\"NOPE\"").is_err());
    }

    #[test]
    fn converts_into_json_string_value() {
        let id = RequestId::parse("x1").unwrap();
        assert_eq!(Value::from(id), Value::String("x1".to_string()));
    }
}
