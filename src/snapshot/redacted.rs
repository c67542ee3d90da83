//! Credential string that never leaks: redacted in Debug output and in
//! serialized configuration, zeroed in memory on drop.

use derive_more::From;
use getset::Getters;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Formatter};
use std::result;
use validator::Validate;
use zeroize::Zeroize;

/// Placeholder written wherever the real value would otherwise appear.
pub static REDACTED: &str = "###REDACTED###";

#[derive(Validate, Clone, From, Getters, PartialEq, Eq)]
#[getset(get = "pub")]
pub struct RedactedString {
    #[validate(length(min = 1))]
    inner: String,
}

impl Zeroize for RedactedString {
    fn zeroize(&mut self) {
        self.inner.zeroize();
    }
}

impl Debug for RedactedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", REDACTED)
    }
}

impl Serialize for RedactedString {
    /// Round-tripping a config through serialization loses the secret on
    /// purpose.
    fn serialize<S: Serializer>(&self, serializer: S) -> result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for RedactedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        deserializer.deserialize_str(RedactedStringVisitor)
    }
}

impl Drop for RedactedString {
    fn drop(&mut self) {
        self.zeroize();
    }
}

struct RedactedStringVisitor;

impl Visitor<'_> for RedactedStringVisitor {
    type Value = RedactedString;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a string")
    }

    fn visit_str<E>(self, v: &str) -> result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(RedactedString::from(v.to_string()))
    }
}
