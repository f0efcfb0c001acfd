//! Room key derivation.
//!
//! A room groups every tab/session that presents the same client identifier
//! (usually the user-agent). The key must be byte-identical to the one the
//! storefront backend computes for its hold-countdown rooms, so the hash below
//! is a wire contract: 32-bit wrapping `hash * 31 + code` over UTF-16 code
//! units, absolute value in base 36, `hold:` prefix.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ROOM_KEY_PREFIX: &str = "hold:";

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomKeyError {
    #[error("malformed room key: {0:?}")]
    Malformed(String),
}

/// Grouping key for a client's concurrent sessions. Not a credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomKey(String);

impl RoomKey {
    /// Derive the room key for a client identifier. Total and pure.
    pub fn derive(client_id: &str) -> Self {
        Self(render_key(rolling_hash(client_id)))
    }

    /// Accept an externally supplied key if it has the `hold:[0-9a-z]+` shape.
    pub fn parse(raw: &str) -> Result<Self, RoomKeyError> {
        let Some(digits) = raw.strip_prefix(ROOM_KEY_PREFIX) else {
            return Err(RoomKeyError::Malformed(raw.to_string()));
        };

        let well_formed = !digits.is_empty()
            && digits
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase());

        if well_formed {
            Ok(Self(raw.to_string()))
        } else {
            Err(RoomKeyError::Malformed(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomKey {
    type Error = RoomKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomKey> for String {
    fn from(key: RoomKey) -> Self {
        key.0
    }
}

/// `hash = (hash << 5) - hash + code`, wrapped to i32 after every step.
pub fn rolling_hash(input: &str) -> i32 {
    input.encode_utf16().fold(0i32, |hash, code| {
        (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(code))
    })
}

fn render_key(hash: i32) -> String {
    // unsigned_abs keeps i32::MIN representable (2147483648)
    let mut n = hash.unsigned_abs();
    let mut digits = Vec::with_capacity(7);

    loop {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }

    let mut key = String::with_capacity(ROOM_KEY_PREFIX.len() + digits.len());
    key.push_str(ROOM_KEY_PREFIX);
    key.extend(digits.iter().rev().map(|&b| char::from(b)));
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    #[test]
    fn empty_input_yields_zero_key() {
        assert_eq!(RoomKey::derive("").as_str(), "hold:0");
    }

    #[test]
    fn matches_reference_values() {
        assert_eq!(RoomKey::derive("a").as_str(), "hold:2p");
        assert_eq!(RoomKey::derive("hello").as_str(), "hold:1n1e4y");
        assert_eq!(RoomKey::derive("car-1").as_str(), "hold:1k7y48");
    }

    #[test]
    fn negative_hash_uses_absolute_value() {
        assert_eq!(rolling_hash(CHROME_UA), -755_103_676);
        assert_eq!(RoomKey::derive(CHROME_UA).as_str(), "hold:chkhq4");
    }

    #[test]
    fn hashes_utf16_code_units() {
        // the car emoji is a surrogate pair; both halves feed the hash
        assert_eq!(rolling_hash("héllo 🚗"), 395_407_756);
        assert_eq!(RoomKey::derive("héllo 🚗").as_str(), "hold:6jeyks");
    }

    #[test]
    fn min_hash_does_not_overflow() {
        assert_eq!(render_key(i32::MIN), "hold:zik0zk");
    }

    #[test]
    fn parse_accepts_derived_keys_and_rejects_garbage() {
        let key = RoomKey::derive(CHROME_UA);
        assert_eq!(RoomKey::parse(key.as_str()), Ok(key));

        for bad in ["", "hold:", "room:abc", "hold:ABC", "hold:12-3", " hold:1"] {
            assert!(RoomKey::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn serde_round_trips_as_plain_string() {
        let key = RoomKey::derive("hello");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"hold:1n1e4y\"");

        let bad: Result<RoomKey, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
