//! Error types for the packing layer
//!
//! Compile-time checks reject unsupported types outright (there is no
//! `Packing` or `Field` impl for them). What remains are the runtime
//! precondition violations: short buffers, corrupt length tags and
//! values that do not decode to a valid instance of their type.

use crate::envelope::EnvelopeError;
use thiserror::Error;

/// Result type alias for packing operations
pub type Result<T> = std::result::Result<T, PackError>;

/// Errors produced while sizing, packing or unpacking
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    /// Unpack needed more bytes than the buffer holds past `position`
    #[error("Buffer underrun at position {position}: needed {needed} bytes, {available} available")]
    BufferUnderrun {
        /// Cursor at the failed read
        position: usize,
        /// Bytes the read required
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// A packed string was not valid UTF-8
    #[error("Invalid UTF-8 in packed string at position {position}")]
    InvalidUtf8 {
        /// Cursor at the start of the string bytes
        position: usize,
    },

    /// A packed bool byte was neither 0 nor 1
    #[error("Invalid bool byte {value:#04x} at position {position}")]
    InvalidBool {
        /// Byte found in the buffer
        value: u8,
        /// Cursor at the byte
        position: usize,
    },

    /// A packed char was not a Unicode scalar value
    #[error("Invalid char scalar {value:#x}")]
    InvalidChar {
        /// Raw `u32` found in the buffer
        value: u32,
    },

    /// A packed `time_t` cannot be represented by the target time type
    #[error("Time value {seconds}s is out of range")]
    TimeOutOfRange {
        /// Seconds since the Unix epoch
        seconds: i64,
    },

    /// A container length tag is larger than the data that could follow it
    #[error("Sequence length {len} exceeds limit {limit} at position {position}")]
    LengthOutOfRange {
        /// Length read from the buffer
        len: usize,
        /// Largest acceptable length
        limit: usize,
        /// Cursor just after the length tag
        position: usize,
    },

    /// An enum discriminant did not name any variant
    #[error("Unknown discriminant {tag} for {type_name}")]
    UnknownDiscriminant {
        /// Discriminant read from the buffer
        tag: usize,
        /// Type being decoded
        type_name: &'static str,
    },

    /// The size pass and the pack pass disagreed
    ///
    /// Indicates a `serialize_op` whose member list depends on the mode.
    #[error("Packed size mismatch: computed {computed}, wrote {written}")]
    SizeMismatch {
        /// Bytes reported by the size pass
        computed: usize,
        /// Bytes actually written
        written: usize,
    },

    /// A whole-object unpack left bytes unread
    #[error("{remaining} trailing bytes after unpacking")]
    TrailingBytes {
        /// Unread byte count
        remaining: usize,
    },

    /// The optional envelope could not be opened
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
}
