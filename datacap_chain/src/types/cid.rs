//! Content identifiers and their multibase text form.
//!
//! The node API carries CIDs as `{"/": "<text>"}` links. Parsing and the
//! multibase codec come from the `cid` and `multibase` crates; text output
//! goes through a [`CidEncoder`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::common::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cid(cid::Cid);

/// Multibase encodings understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multibase {
    /// RFC 4648 lowercase, no padding, prefix `b`.
    Base32,
    /// Bitcoin alphabet, prefix `z`.
    Base58Btc,
}

impl Multibase {
    fn base(self) -> multibase::Base {
        match self {
            Multibase::Base32 => multibase::Base::Base32Lower,
            Multibase::Base58Btc => multibase::Base::Base58Btc,
        }
    }

    pub fn encode(self, data: &[u8]) -> String {
        multibase::encode(self.base(), data)
    }
}

impl Cid {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        cid::Cid::try_from(bytes.as_slice())
            .map(Cid)
            .map_err(|e| Error::Encoding(format!("invalid CID bytes: {}", e)))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    pub fn version(&self) -> u8 {
        match self.0.version() {
            cid::Version::V0 => 0,
            cid::Version::V1 => 1,
        }
    }
}

impl FromStr for Cid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        cid::Cid::try_from(s)
            .map(Cid)
            .map_err(|e| Error::Encoding(format!("invalid CID {:?}: {}", s, e)))
    }
}

/// Renders CIDs in a fixed multibase.
///
/// CIDv0 has no multibase form and is always rendered as bare base58btc.
#[derive(Debug, Clone, Copy)]
pub struct CidEncoder {
    base: Multibase,
}

impl CidEncoder {
    pub fn new(base: Multibase) -> Self {
        Self { base }
    }

    pub fn encode(&self, cid: &Cid) -> String {
        match cid.0.version() {
            cid::Version::V0 => cid.0.to_string(),
            cid::Version::V1 => self.base.encode(&cid.0.to_bytes()),
        }
    }
}

impl Default for CidEncoder {
    fn default() -> Self {
        Self::new(Multibase::Base32)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&CidEncoder::default().encode(self))
    }
}

#[derive(Serialize, Deserialize)]
struct CidLink {
    #[serde(rename = "/")]
    link: String,
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        CidLink {
            link: self.to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let CidLink { link } = CidLink::deserialize(deserializer)?;
        link.parse().map_err(serde::de::Error::custom)
    }
}
