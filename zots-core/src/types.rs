//! Core types used across the proof subsystem.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Raw 32-byte hash output
pub type Hash256 = [u8; 32];

/// Content fingerprint carried by a proof (32 bytes for every supported algorithm).
///
/// Serializes as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(Hash256);

impl Digest {
    pub const LEN: usize = 32;

    pub fn new(bytes: Hash256) -> Self {
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: Hash256 = slice.try_into().map_err(|_| {
            Error::invalid(format!(
                "digest must be {} bytes, got {}",
                Self::LEN,
                slice.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &Hash256 {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse exactly 64 hex characters. Use [`crate::digest_from_hex`] for
    /// caller-supplied identifiers that may need re-hashing.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::invalid(format!("invalid hex: {e}")))?;
        Self::from_slice(&bytes)
    }
}

impl From<Hash256> for Digest {
    fn from(bytes: Hash256) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}..)", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Transaction identifier, stored in the chain's internal byte order.
///
/// The display form (what explorers show) is the byte-reversed hex string;
/// serde uses the display form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId(Hash256);

impl TxId {
    pub const LEN: usize = 32;

    /// Wrap bytes already in internal order.
    pub fn from_internal(bytes: Hash256) -> Self {
        Self(bytes)
    }

    pub fn as_internal(&self) -> &Hash256 {
        &self.0
    }

    /// Display-order hex (byte-reversed).
    pub fn to_display_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Parse display-order hex back into internal order.
    pub fn from_display_hex(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s.trim()).map_err(|e| Error::invalid(format!("invalid txid hex: {e}")))?;
        let mut internal: Hash256 = bytes.as_slice().try_into().map_err(|_| {
            Error::invalid(format!("txid must be {} bytes, got {}", Self::LEN, bytes.len()))
        })?;
        internal.reverse();
        Ok(Self(internal))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.to_display_hex())
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_hex())
    }
}

impl FromStr for TxId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_display_hex(s)
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_display_hex())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_display_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Chain network an attestation lives on. Attestations from different
/// networks are never interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Wire tag used by the compact record
    pub fn tag(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x01,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Network::Mainnet),
            0x01 => Some(Network::Testnet),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// Block explorer base URL
    pub fn explorer_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://explorer.zec.rocks",
            Network::Testnet => "https://testnet.zcashexplorer.app",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(Error::invalid(format!(
                "unknown network '{other}': use 'mainnet' or 'testnet'"
            ))),
        }
    }
}
