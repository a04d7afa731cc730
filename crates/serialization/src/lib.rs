//! In-memory serialization for simulator state
//!
//! This crate provides:
//! - [`Packing`]: pack-size/pack/unpack for leaf values (POD scalars and
//!   arrays, `String`, time points, [`Bitset`])
//! - [`MemPacker`]: the facade over a byte buffer with an explicit cursor
//! - [`Field`] and [`Serializer`]: the member visitor every persisted
//!   aggregate implements once and reuses for sizing, packing, unpacking
//!   and equality testing
//! - [`envelope`]: an optional checksummed, versioned wrapper
//!
//! The packed format is native-endian and carries no schema. It is meant
//! for checkpoints and process-to-process transfer on one architecture.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bitset;
pub mod config;
pub mod envelope;
pub mod equality;
pub mod error;
pub mod mem_packer;
pub mod packing;
pub mod serializer;
pub mod testing;

pub use bitset::Bitset;
pub use config::{ConfigError, PackerConfig};
pub use envelope::EnvelopeError;
pub use equality::{compare_persisted, persisted_eq, Comparison, Divergence, EqualitySerializer};
pub use error::{PackError, Result};
pub use mem_packer::MemPacker;
pub use packing::{time_t, Packing, TimePoint};
pub use serializer::{Field, PackSerializer, Serializer, SerializerMode, SizeSerializer, UnpackSerializer};
pub use testing::{assert_round_trip, SerializationTestObject};
