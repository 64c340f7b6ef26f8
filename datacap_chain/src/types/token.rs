use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::common::{Error, Result};

/// Non-negative big integer as carried by the node API: a decimal string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(u128);

/// Remaining datacap of a verified client, in bytes.
pub type DataCap = TokenAmount;

impl TokenAmount {
    pub const fn new(value: u128) -> Self {
        TokenAmount(value)
    }

    pub fn value(&self) -> u128 {
        self.0
    }
}

impl FromStr for TokenAmount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u128>()
            .map(TokenAmount)
            .map_err(|e| Error::Encoding(format!("invalid big int {:?}: {}", s, e)))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
