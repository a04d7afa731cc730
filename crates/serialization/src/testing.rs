//! Round-trip helpers for persisted types
//!
//! Types implement [`SerializationTestObject`] to provide one
//! representative, non-default instance. [`assert_round_trip`] then checks
//! that it packs, unpacks and compares consistently.

use std::fmt::Debug;

use crate::equality::{compare_persisted, Comparison};
use crate::error::Result;
use crate::mem_packer::MemPacker;
use crate::serializer::Field;

/// A persisted type with a representative test instance
pub trait SerializationTestObject: Field + Default + PartialEq + Debug {
    /// An instance with every member set to a non-default value.
    fn serialization_test_object() -> Self;
}

/// Pack then unpack `value`, returning the copy.
pub fn round_trip<T: Field + Default>(value: &mut T) -> Result<T> {
    let packer = MemPacker::new();
    let bytes = packer.pack_object(value)?;
    packer.unpack_object(&bytes)
}

/// Check the full round-trip contract for `T`.
///
/// # Panics
///
/// When the copy differs from the original by `==` or by persisted
/// state, or when sizing disagrees with packing.
pub fn assert_round_trip<T: SerializationTestObject>() {
    let packer = MemPacker::new();
    let mut original = T::serialization_test_object();
    assert_ne!(
        original,
        T::default(),
        "serialization_test_object should differ from the default instance"
    );

    let size = match packer.object_size(&mut original) {
        Ok(size) => size,
        Err(err) => panic!("sizing failed: {err}"),
    };
    let bytes = match packer.pack_object(&mut original) {
        Ok(bytes) => bytes,
        Err(err) => panic!("packing failed: {err}"),
    };
    assert_eq!(bytes.len(), size, "object_size disagrees with packed length");

    let mut copy: T = match packer.unpack_object(&bytes) {
        Ok(copy) => copy,
        Err(err) => panic!("unpacking failed: {err}"),
    };
    assert_eq!(copy, original);

    match compare_persisted(&mut original, &mut copy) {
        Ok(Comparison::Equal) => {}
        Ok(Comparison::Differ(d)) => panic!("persisted state differs at {d:?}"),
        Err(err) => panic!("comparison failed: {err}"),
    }
}
