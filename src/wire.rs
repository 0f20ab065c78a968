//! Binary chunk framing (spec §4.4):
//!
//! ```text
//!  0      1       2           4                  12            12+N
//!  +------+-------+-----------+------------------+--------------+
//!  | ver  | flags | seq_no_16 | captured_at_unix_ms_64         | payload(N)
//!  +------+-------+-----------+------------------+--------------+
//!    u8     u8      u16 BE        u64 BE              i16 LE samples
//! ```
//!
//! No existing crate in the pack models this exact 12-byte header, so it
//! is hand-rolled here and validated by round-trip tests.

use crate::error::ProtocolError;

pub const FRAME_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 12;
const FLAG_IS_FINAL: u8 = 0b0000_0001;

/// A decoded wire frame, borrowing its payload from the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub version: u8,
    pub is_final: bool,
    pub sequence_no: u16,
    pub captured_at_unix_ms: u64,
    pub payload: Vec<u8>,
}

/// Encodes a chunk into the wire format.
pub fn encode(
    sequence_no: u16,
    captured_at_unix_ms: u64,
    is_final: bool,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(FRAME_VERSION);
    out.push(if is_final { FLAG_IS_FINAL } else { 0 });
    out.extend_from_slice(&sequence_no.to_be_bytes());
    out.extend_from_slice(&captured_at_unix_ms.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Decodes a wire frame, validating version and payload alignment.
pub fn decode(bytes: &[u8]) -> Result<WireFrame, ProtocolError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::FrameTooShort(bytes.len()));
    }
    let version = bytes[0];
    if version != FRAME_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }
    let flags = bytes[1];
    let sequence_no = u16::from_be_bytes([bytes[2], bytes[3]]);
    let captured_at_unix_ms = u64::from_be_bytes(bytes[4..12].try_into().unwrap());
    let payload = &bytes[HEADER_LEN..];
    if payload.len() % 2 != 0 {
        return Err(ProtocolError::MisalignedPayload(payload.len()));
    }
    Ok(WireFrame {
        version,
        is_final: flags & FLAG_IS_FINAL != 0,
        sequence_no,
        captured_at_unix_ms,
        payload: payload.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_non_final_chunk() {
        let payload: Vec<u8> = (0i16..100).flat_map(|s| s.to_le_bytes()).collect();
        let encoded = encode(42, 1_700_000_000_000, false, &payload);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.version, FRAME_VERSION);
        assert!(!decoded.is_final);
        assert_eq!(decoded.sequence_no, 42);
        assert_eq!(decoded.captured_at_unix_ms, 1_700_000_000_000);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn round_trips_final_empty_chunk() {
        let encoded = encode(7, 123, true, &[]);
        let decoded = decode(&encoded).unwrap();
        assert!(decoded.is_final);
        assert_eq!(decoded.sequence_no, 7);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn rejects_short_frame() {
        assert!(matches!(
            decode(&[1, 0, 0]),
            Err(ProtocolError::FrameTooShort(3))
        ));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut encoded = encode(1, 0, false, &[]);
        encoded[0] = 99;
        assert!(matches!(
            decode(&encoded),
            Err(ProtocolError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn rejects_misaligned_payload() {
        let mut encoded = encode(1, 0, false, &[1, 2, 3, 4]);
        encoded.pop();
        assert!(matches!(
            decode(&encoded),
            Err(ProtocolError::MisalignedPayload(3))
        ));
    }

    #[test]
    fn header_length_matches_spec_diagram() {
        assert_eq!(HEADER_LEN, 12);
    }
}
