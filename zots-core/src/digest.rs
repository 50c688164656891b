//! Digest engine.
//!
//! Pure hashing over bytes, readers and files with a selectable algorithm.
//! SHA-256 is the default.

use crate::error::{Error, Result};
use crate::types::Digest;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

const READ_CHUNK: usize = 8192;

/// Hash algorithm carried inside every proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl DigestAlgorithm {
    /// User-facing algorithm name
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Blake3 => "BLAKE3",
        }
    }

    /// Lowercase name used by the canonical form
    pub fn wire_name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Blake3 => "blake3",
        }
    }

    /// Tag used by the compact record
    pub fn tag(self) -> u8 {
        match self {
            DigestAlgorithm::Sha256 => 0x00,
            DigestAlgorithm::Blake3 => 0x01,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(DigestAlgorithm::Sha256),
            0x01 => Some(DigestAlgorithm::Blake3),
            _ => None,
        }
    }

    /// Output length in bytes
    pub fn digest_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha256 | DigestAlgorithm::Blake3 => Digest::LEN,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "blake3" => Ok(DigestAlgorithm::Blake3),
            other => Err(Error::invalid(format!("unknown hash algorithm '{other}'"))),
        }
    }
}

/// Incremental hasher over either algorithm.
enum Hasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        use sha2::Digest as _;
        match algorithm {
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        use sha2::Digest as _;
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> Digest {
        use sha2::Digest as _;
        match self {
            Hasher::Sha256(h) => Digest::new(h.finalize().into()),
            Hasher::Blake3(h) => Digest::new(*h.finalize().as_bytes()),
        }
    }
}

/// Hash raw bytes with the selected algorithm.
pub fn digest(data: &[u8], algorithm: DigestAlgorithm) -> Digest {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Hash everything a reader yields, in fixed-size chunks.
pub fn digest_stream<R: Read>(mut reader: R, algorithm: DigestAlgorithm) -> Result<Digest> {
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}

/// Hash a file by path using streaming.
pub fn digest_file(path: impl AsRef<Path>, algorithm: DigestAlgorithm) -> Result<Digest> {
    let file = File::open(path)?;
    digest_stream(BufReader::new(file), algorithm)
}

/// Turn a caller-supplied hex identifier into a digest.
///
/// Accepts:
/// - 64 hex chars: a digest already in the target length, used as-is
/// - 40 hex chars: a foreign identifier (e.g. a git commit id) which is
///   re-hashed with `algorithm`, never trusted as a digest
///
/// Surrounding whitespace and an optional `0x` prefix are ignored.
pub fn digest_from_hex(text: &str, algorithm: DigestAlgorithm) -> Result<Digest> {
    let cleaned = text.trim();
    let cleaned = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .unwrap_or(cleaned);

    match cleaned.len() {
        40 => {
            let bytes =
                hex::decode(cleaned).map_err(|e| Error::invalid(format!("invalid hex: {e}")))?;
            Ok(digest(&bytes, algorithm))
        }
        64 => Digest::from_hex(cleaned),
        n => Err(Error::invalid(format!("expected 40 or 64 hex chars, got {n}"))),
    }
}
