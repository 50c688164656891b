//! Memo payload carrying a digest inside an anchoring transaction.
//!
//! Payload: 8-byte marker followed by the 32-byte digest. The memo is
//! zero-padded to the chain's 512-byte memo size.

use crate::types::Digest;

/// Marker preceding the digest in a memo: `\x00zOTS\x00\x00\x01`
pub const MEMO_MAGIC: [u8; 8] = [0x00, 0x7A, 0x4F, 0x54, 0x53, 0x00, 0x00, 0x01];

/// Fixed memo field size
pub const MEMO_SIZE: usize = 512;

/// Marker + digest
pub const MEMO_PAYLOAD_LEN: usize = MEMO_MAGIC.len() + Digest::LEN;

/// Where [`create_timestamp_memo`] places the payload
pub const MEMO_PAYLOAD_OFFSET: u16 = 0;

/// Build a memo with the payload at [`MEMO_PAYLOAD_OFFSET`].
pub fn create_timestamp_memo(digest: &Digest) -> Vec<u8> {
    let mut memo = Vec::with_capacity(MEMO_SIZE);
    memo.extend_from_slice(&MEMO_MAGIC);
    memo.extend_from_slice(digest.as_bytes());
    memo.resize(MEMO_SIZE, 0);
    memo
}

/// Extract the digest from the payload starting at `offset`.
///
/// Returns `None` when the memo is too short or the marker is absent.
pub fn parse_timestamp_memo(memo: &[u8], offset: u16) -> Option<Digest> {
    let start = usize::from(offset);
    let payload = memo.get(start..start.checked_add(MEMO_PAYLOAD_LEN)?)?;

    if payload[..MEMO_MAGIC.len()] != MEMO_MAGIC {
        return None;
    }
    Digest::from_slice(&payload[MEMO_MAGIC.len()..]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_memo() {
        let digest = Digest::new([0xab; 32]);
        let memo = create_timestamp_memo(&digest);

        assert_eq!(memo.len(), MEMO_SIZE);
        assert_eq!(&memo[..8], &MEMO_MAGIC);
        assert_eq!(&memo[8..40], digest.as_bytes());
        assert!(memo[40..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parse_roundtrip() {
        let digest = Digest::new([0xcd; 32]);
        let memo = create_timestamp_memo(&digest);
        assert_eq!(parse_timestamp_memo(&memo, 0), Some(digest));
    }

    #[test]
    fn test_parse_at_offset() {
        let digest = Digest::new([0x5a; 32]);
        let mut memo = vec![0xee; 16];
        memo.extend_from_slice(&create_timestamp_memo(&digest)[..MEMO_PAYLOAD_LEN]);

        assert_eq!(parse_timestamp_memo(&memo, 16), Some(digest));
        assert_eq!(parse_timestamp_memo(&memo, 0), None);
    }

    #[test]
    fn test_parse_invalid_magic() {
        let memo = vec![0u8; MEMO_SIZE];
        assert_eq!(parse_timestamp_memo(&memo, 0), None);
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(parse_timestamp_memo(&[0u8; 20], 0), None);
        let memo = create_timestamp_memo(&Digest::new([1; 32]));
        assert_eq!(parse_timestamp_memo(&memo, u16::MAX), None);
    }
}
