//! Optional checksummed envelope around a packed payload
//!
//! The raw pack format carries no magic, version or length. Callers that
//! move packed state between processes can wrap it in an envelope to
//! detect truncation, corruption and version skew.
//!
//! # Layout
//!
//! ```text
//! [magic "OPMP": 4][version: u16][flags: u16][payload_len: u64][crc32: u32][payload]
//! ```
//!
//! All header fields are little-endian.

use thiserror::Error;
use tracing::trace;

/// Envelope magic bytes
pub const ENVELOPE_MAGIC: [u8; 4] = *b"OPMP";

/// Envelope version written by [`seal`]
pub const ENVELOPE_VERSION: u16 = 1;

/// Bytes before the payload
pub const ENVELOPE_HEADER_SIZE: usize = 4 + 2 + 2 + 8 + 4;

/// Errors opening an envelope
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Input does not start with the envelope magic
    #[error("Invalid envelope magic")]
    InvalidMagic,

    /// Envelope written by an unknown format version
    #[error("Unsupported envelope version {found}")]
    UnsupportedVersion {
        /// Version stored in the header
        found: u16,
    },

    /// Input shorter than its header or declared payload
    #[error("Envelope truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required
        expected: usize,
        /// Bytes present
        actual: usize,
    },

    /// Payload CRC does not match the header
    #[error("Envelope checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// CRC in the header
        stored: u32,
        /// CRC of the payload bytes
        computed: u32,
    },
}

/// Wrap `payload` in a versioned, checksummed envelope.
pub fn seal(payload: &[u8]) -> Vec<u8> {
    let crc = crc32fast::hash(payload);
    let mut out = Vec::with_capacity(ENVELOPE_HEADER_SIZE + payload.len());
    out.extend_from_slice(&ENVELOPE_MAGIC);
    out.extend_from_slice(&ENVELOPE_VERSION.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(payload);
    trace!(target: "opm::serialization", len = payload.len(), crc, "Sealed payload");
    out
}

/// Validate an envelope and borrow its payload.
///
/// Bytes past the declared payload length are ignored.
pub fn open(data: &[u8]) -> Result<&[u8], EnvelopeError> {
    if data.len() < ENVELOPE_HEADER_SIZE {
        if data.len() >= 4 && data[0..4] != ENVELOPE_MAGIC {
            return Err(EnvelopeError::InvalidMagic);
        }
        return Err(EnvelopeError::Truncated {
            expected: ENVELOPE_HEADER_SIZE,
            actual: data.len(),
        });
    }

    if data[0..4] != ENVELOPE_MAGIC {
        return Err(EnvelopeError::InvalidMagic);
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != ENVELOPE_VERSION {
        return Err(EnvelopeError::UnsupportedVersion { found: version });
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&data[8..16]);
    let payload_len = u64::from_le_bytes(len_bytes);

    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&data[16..20]);
    let stored = u32::from_le_bytes(crc_bytes);

    let available = data.len() - ENVELOPE_HEADER_SIZE;
    let payload_len = match usize::try_from(payload_len) {
        Ok(len) if len <= available => len,
        Ok(len) => {
            return Err(EnvelopeError::Truncated {
                expected: ENVELOPE_HEADER_SIZE.saturating_add(len),
                actual: data.len(),
            })
        }
        Err(_) => {
            return Err(EnvelopeError::Truncated {
                expected: usize::MAX,
                actual: data.len(),
            })
        }
    };

    let payload = &data[ENVELOPE_HEADER_SIZE..ENVELOPE_HEADER_SIZE + payload_len];
    let computed = crc32fast::hash(payload);
    if computed != stored {
        return Err(EnvelopeError::ChecksumMismatch { stored, computed });
    }

    Ok(payload)
}
