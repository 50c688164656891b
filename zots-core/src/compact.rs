//! Compact (short form) proof encoding.
//!
//! Dense, URL-safe text for QR codes, image metadata and commit trailers.
//!
//! ## Layout
//! 1. Fixed binary record, all integers little-endian:
//!    ```text
//!    u8  version
//!    u8  algorithm tag
//!    [32] digest
//!    u8  attestation count
//!    per attestation:
//!      u8  attestation type tag
//!      u8  network tag
//!      [32] txid (internal order)
//!      u32 block height
//!      u32 block time
//!      u16 memo offset
//!    ```
//! 2. The record is wrapped as the first element of a CBOR array. Later array
//!    elements, and record bytes past the last declared attestation, are
//!    skipped on decode.
//! 3. base64url without padding.
//! 4. `zots1` prefix.
//!
//! Encoding is deterministic. Decoding is lenient about how the CBOR wrapper
//! is framed (ciborium enforces declared lengths and nesting limits) but
//! strict about the record itself.

use crate::digest::DigestAlgorithm;
use crate::error::{Error, Result};
use crate::proof::{check_version, Attestation, TimestampProof, ATTESTATION_TYPE_CHAIN_MEMO};
use crate::types::{Digest, Hash256, Network, TxId};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ciborium::value::Value;

/// Format and version-family marker
pub const COMPACT_PREFIX: &str = "zots1";

/// One base64 quantum must follow the prefix
const MIN_PAYLOAD_CHARS: usize = 4;

/// version + algorithm + digest + count
const HEADER_LEN: usize = 1 + 1 + 32 + 1;

/// type + network + txid + height + time + memo offset
const ATTESTATION_LEN: usize = 1 + 1 + 32 + 4 + 4 + 2;

/// Encode a proof to its compact text form.
pub fn encode_compact(proof: &TimestampProof) -> Result<String> {
    let record = pack_record(proof)?;
    let packed = wrap_record(record)?;

    let mut out = String::with_capacity(COMPACT_PREFIX.len() + packed.len() * 4 / 3 + 4);
    out.push_str(COMPACT_PREFIX);
    out.push_str(&URL_SAFE_NO_PAD.encode(packed));
    Ok(out)
}

/// Decode a proof from its compact text form.
pub fn decode_compact(text: &str) -> Result<TimestampProof> {
    let payload = text
        .trim()
        .strip_prefix(COMPACT_PREFIX)
        .ok_or_else(|| Error::malformed(format!("missing `{COMPACT_PREFIX}` prefix")))?;

    let packed = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::malformed(format!("invalid base64: {e}")))?;

    let record = unwrap_record(&packed)?;
    unpack_record(&record)
}

/// Cheap check for the compact form: prefix plus a minimum length.
///
/// Never decodes the payload, so it is safe on arbitrary scanned text.
pub fn is_compact(text: &str) -> bool {
    let text = text.trim();
    text.len() >= COMPACT_PREFIX.len() + MIN_PAYLOAD_CHARS && text.starts_with(COMPACT_PREFIX)
}

fn pack_record(proof: &TimestampProof) -> Result<Vec<u8>> {
    check_version(u64::from(proof.version))?;

    let count = u8::try_from(proof.attestations.len()).map_err(|_| {
        Error::invalid(format!(
            "compact form holds at most {} attestations, proof has {}",
            u8::MAX,
            proof.attestations.len()
        ))
    })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + proof.attestations.len() * ATTESTATION_LEN);
    buf.push(proof.version);
    buf.push(proof.algorithm.tag());
    buf.extend_from_slice(proof.digest.as_bytes());
    buf.push(count);

    for att in &proof.attestations {
        buf.push(ATTESTATION_TYPE_CHAIN_MEMO);
        buf.push(att.network.tag());
        buf.extend_from_slice(att.txid.as_internal());
        buf.extend_from_slice(&att.block_height.to_le_bytes());
        buf.extend_from_slice(&att.block_time.to_le_bytes());
        buf.extend_from_slice(&att.memo_offset.to_le_bytes());
    }

    Ok(buf)
}

fn unpack_record(record: &[u8]) -> Result<TimestampProof> {
    let mut reader = RecordReader::new(record);

    // Version before anything else
    let version = reader.u8("version")?;
    check_version(u64::from(version))?;

    let algorithm_tag = reader.u8("algorithm")?;
    let algorithm = DigestAlgorithm::from_tag(algorithm_tag)
        .ok_or_else(|| Error::malformed(format!("unknown algorithm tag {algorithm_tag:#04x}")))?;
    let digest = Digest::new(reader.array32("digest")?);
    let count = reader.u8("attestation count")? as usize;

    if reader.remaining() < count * ATTESTATION_LEN {
        return Err(Error::malformed(format!(
            "record declares {count} attestations but only {} bytes follow",
            reader.remaining()
        )));
    }

    let mut attestations = Vec::with_capacity(count);
    for i in 0..count {
        let kind = reader.u8("attestation type")?;
        if kind != ATTESTATION_TYPE_CHAIN_MEMO {
            return Err(Error::malformed(format!(
                "attestation {i}: unknown type tag {kind:#04x}"
            )));
        }
        let network_tag = reader.u8("network")?;
        let network = Network::from_tag(network_tag).ok_or_else(|| {
            Error::malformed(format!("attestation {i}: unknown network tag {network_tag:#04x}"))
        })?;
        let txid = TxId::from_internal(reader.array32("txid")?);
        let block_height = u32::from_le_bytes(reader.array("block height")?);
        let block_time = u32::from_le_bytes(reader.array("block time")?);
        let memo_offset = u16::from_le_bytes(reader.array("memo offset")?);

        attestations.push(Attestation::new(
            network,
            txid,
            block_height,
            block_time,
            memo_offset,
        ));
    }

    Ok(TimestampProof {
        version,
        algorithm,
        digest,
        attestations,
    })
}

/// Bounds-checked cursor over the binary record.
struct RecordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize, field: &str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::malformed(format!("record truncated at {field}")));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    fn array<const N: usize>(&mut self, field: &str) -> Result<[u8; N]> {
        let slice = self.take(N, field)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn array32(&mut self, field: &str) -> Result<Hash256> {
        self.array::<32>(field)
    }
}

fn wrap_record(record: Vec<u8>) -> Result<Vec<u8>> {
    let value = Value::Array(vec![Value::Bytes(record)]);
    let mut buf = Vec::new();
    ciborium::into_writer(&value, &mut buf)
        .map_err(|e| Error::malformed(format!("CBOR encoding failed: {e}")))?;
    Ok(buf)
}

fn unwrap_record(packed: &[u8]) -> Result<Vec<u8>> {
    let value: Value = ciborium::from_reader(packed)
        .map_err(|e| Error::malformed(format!("invalid CBOR: {e}")))?;

    match value {
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Bytes(record)) => Ok(record),
            Some(_) => Err(Error::malformed("first CBOR element must be a byte string")),
            None => Err(Error::malformed("empty CBOR array")),
        },
        _ => Err(Error::malformed("packed proof must be a CBOR array")),
    }
}
