//! In-memory packer facade
//!
//! `MemPacker` is the entry point used for checkpointing and for moving
//! simulator state between processes. Leaf operations forward to
//! [`Packing`]; slice operations are restricted to [`Pod`] elements; the
//! `*_object` operations drive a whole [`Field`] aggregate through the
//! size, pack and unpack serializers.
//!
//! The packer holds no mutable state. Independent buffers can be packed
//! concurrently with copies of the same packer.

use bytemuck::Pod;
use tracing::{debug, trace};

use crate::config::{ConfigError, PackerConfig};
use crate::envelope;
use crate::error::{PackError, Result};
use crate::packing::{pack_pod_slice, pod_slice_size, unpack_pod_slice, Packing};
use crate::serializer::{Field, PackSerializer, SizeSerializer, UnpackSerializer};

/// Pack/unpack facade over a byte buffer and an explicit cursor
#[derive(Debug, Clone, Copy, Default)]
pub struct MemPacker {
    config: PackerConfig,
}

impl MemPacker {
    /// Packer with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Packer with a validated configuration.
    pub fn with_config(config: PackerConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration.
    pub fn config(&self) -> &PackerConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Leaves
    // ------------------------------------------------------------------------

    /// Bytes needed to pack `value`.
    pub fn pack_size<T: Packing>(&self, value: &T) -> usize {
        value.pack_size()
    }

    /// Bytes needed to pack `data` as one block.
    pub fn pack_size_slice<T: Pod>(&self, data: &[T]) -> usize {
        pod_slice_size(data)
    }

    /// Pack `value` at `position` and advance it.
    pub fn pack<T: Packing>(&self, value: &T, buffer: &mut Vec<u8>, position: &mut usize) {
        value.pack(buffer, position);
    }

    /// Pack `data` as one contiguous block.
    pub fn pack_slice<T: Pod>(&self, data: &[T], buffer: &mut Vec<u8>, position: &mut usize) {
        pack_pod_slice(data, buffer, position);
    }

    /// Unpack into `value` from `position` and advance it.
    pub fn unpack<T: Packing>(&self, value: &mut T, buffer: &[u8], position: &mut usize) -> Result<()> {
        value.unpack(buffer, position)
    }

    /// Unpack `data.len()` elements.
    pub fn unpack_slice<T: Pod>(&self, data: &mut [T], buffer: &[u8], position: &mut usize) -> Result<()> {
        unpack_pod_slice(data, buffer, position)
    }

    // ------------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------------

    /// Packed size of a whole aggregate.
    pub fn object_size<T: Field>(&self, value: &mut T) -> Result<usize> {
        let mut sizer = SizeSerializer::new();
        value.serialize_op(&mut sizer)?;
        Ok(sizer.total())
    }

    /// Pack an aggregate at `position` and advance it.
    pub fn pack_into<T: Field>(&self, value: &mut T, buffer: &mut Vec<u8>, position: &mut usize) -> Result<()> {
        let mut packer = PackSerializer::new(buffer, *position);
        value.serialize_op(&mut packer)?;
        *position = packer.position();
        Ok(())
    }

    /// Pack an aggregate into an exactly sized buffer.
    pub fn pack_object<T: Field>(&self, value: &mut T) -> Result<Vec<u8>> {
        let computed = self.object_size(value)?;
        let mut buffer = Vec::with_capacity(computed);
        let mut position = 0;
        self.pack_into(value, &mut buffer, &mut position)?;

        if position != computed {
            return Err(PackError::SizeMismatch {
                computed,
                written: position,
            });
        }
        trace!(target: "opm::serialization", bytes = computed, "Packed object");
        Ok(buffer)
    }

    /// Unpack an aggregate in place from `position` and advance it.
    pub fn unpack_into<T: Field>(&self, value: &mut T, buffer: &[u8], position: &mut usize) -> Result<()> {
        let mut unpacker = UnpackSerializer::new(buffer, *position).with_max_sequence_len(self.config.max_sequence_len);
        value.serialize_op(&mut unpacker)?;
        *position = unpacker.position();
        Ok(())
    }

    /// Unpack a whole aggregate from `buffer`.
    ///
    /// With `reject_trailing_bytes` set, the buffer must hold exactly one
    /// object.
    pub fn unpack_object<T: Field + Default>(&self, buffer: &[u8]) -> Result<T> {
        let mut value = T::default();
        let mut position = 0;
        self.unpack_into(&mut value, buffer, &mut position)?;

        let remaining = buffer.len() - position;
        if remaining > 0 {
            if self.config.reject_trailing_bytes {
                return Err(PackError::TrailingBytes { remaining });
            }
            debug!(target: "opm::serialization", remaining, "Ignoring trailing bytes after object");
        }
        Ok(value)
    }

    /// Pack an aggregate and wrap it in a checksummed envelope.
    pub fn pack_sealed<T: Field>(&self, value: &mut T) -> Result<Vec<u8>> {
        let payload = self.pack_object(value)?;
        Ok(envelope::seal(&payload))
    }

    /// Open an envelope and unpack the aggregate inside it.
    pub fn unpack_sealed<T: Field + Default>(&self, data: &[u8]) -> Result<T> {
        let payload = envelope::open(data)?;
        self.unpack_object(payload)
    }
}
