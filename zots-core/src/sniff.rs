//! Format sniffing for arbitrary pasted or scanned text.

use crate::canonical::decode_canonical;
use crate::compact::{decode_compact, is_compact};
use crate::error::{Error, Result};
use crate::proof::TimestampProof;
use std::fmt;

/// Which proof encoding a piece of text looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofFormat {
    Compact,
    Canonical,
    Unknown,
}

impl fmt::Display for ProofFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofFormat::Compact => write!(f, "compact"),
            ProofFormat::Canonical => write!(f, "canonical"),
            ProofFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify text without decoding it. Never fails.
pub fn classify(text: &str) -> ProofFormat {
    if is_compact(text) {
        return ProofFormat::Compact;
    }

    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') && trimmed.contains("\"version\"") {
        return ProofFormat::Canonical;
    }

    ProofFormat::Unknown
}

/// Decode whichever encoding the text is in.
pub fn decode_any(text: &str) -> Result<TimestampProof> {
    match classify(text) {
        ProofFormat::Compact => decode_compact(text),
        ProofFormat::Canonical => decode_canonical(text),
        ProofFormat::Unknown => Err(Error::malformed(
            "input is neither a compact nor a canonical proof",
        )),
    }
}
