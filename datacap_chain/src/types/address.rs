use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::common::{Error, Result};

const BASE32_SYMBOLS: &str = "abcdefghijklmnopqrstuvwxyz234567";

/// Filecoin network an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

/// Address protocol, encoded as the digit after the network prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Id,
    Secp256k1,
    Actor,
    Bls,
    Delegated,
}

/// A Filecoin address in its textual form (`f1...`, `t01234`, ...).
///
/// Only the shape is checked here; checksum verification is left to the node.
/// The empty string decodes to the undefined address, as the node API does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    pub fn undef() -> Self {
        Address(String::new())
    }

    pub fn is_undef(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn network(&self) -> Option<Network> {
        match self.0.as_bytes().first() {
            Some(b'f') => Some(Network::Mainnet),
            Some(b't') => Some(Network::Testnet),
            _ => None,
        }
    }

    pub fn protocol(&self) -> Option<Protocol> {
        match self.0.as_bytes().get(1) {
            Some(b'0') => Some(Protocol::Id),
            Some(b'1') => Some(Protocol::Secp256k1),
            Some(b'2') => Some(Protocol::Actor),
            Some(b'3') => Some(Protocol::Bls),
            Some(b'4') => Some(Protocol::Delegated),
            _ => None,
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Address::undef());
        }
        let invalid = |reason: &str| Error::RequestValidation(format!("invalid address {:?}: {}", s, reason));

        if s.len() < 3 {
            return Err(invalid("too short"));
        }
        let addr = Address(s.to_string());
        if addr.network().is_none() {
            return Err(invalid("unknown network"));
        }
        let protocol = addr.protocol().ok_or_else(|| invalid("unknown protocol"))?;
        let payload = &s[2..];

        let well_formed = match protocol {
            Protocol::Id => payload.bytes().all(|b| b.is_ascii_digit()),
            Protocol::Secp256k1 | Protocol::Actor | Protocol::Bls => is_base32(payload),
            // f4<namespace>f<base32 subaddress>
            Protocol::Delegated => match payload.split_once('f') {
                Some((namespace, sub)) => {
                    !namespace.is_empty()
                        && namespace.bytes().all(|b| b.is_ascii_digit())
                        && is_base32(sub)
                }
                None => false,
            },
        };
        if !well_formed {
            return Err(invalid("malformed payload"));
        }
        Ok(addr)
    }
}

fn is_base32(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| BASE32_SYMBOLS.contains(c))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
