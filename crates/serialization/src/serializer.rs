//! Member-visitor serialization
//!
//! Every persisted aggregate implements [`Field`] by visiting its members
//! in a fixed declared order. The same visit drives every mode:
//!
//! | Mode      | Serializer             | Effect                              |
//! |-----------|------------------------|-------------------------------------|
//! | `Size`    | [`SizeSerializer`]     | sums the packed size                |
//! | `Pack`    | [`PackSerializer`]     | writes leaves into a buffer         |
//! | `Unpack`  | [`UnpackSerializer`]   | overwrites leaves from a buffer     |
//! | `Compare` | `EqualitySerializer`   | compares leaves against a reference |
//!
//! The visit order is the wire order. Reordering members in a
//! `serialize_op` changes the format.
//!
//! # Containers
//!
//! A container visits a `usize` size tag and then its elements. On unpack
//! the container is cleared and rebuilt from `Default` elements before
//! they are visited. Enums follow the same idea: visit the discriminant
//! with [`Serializer::size_tag`], then the payload of the active variant.
//!
//! ```
//! use opm_serialization::{Field, Serializer, Result};
//!
//! #[derive(Default)]
//! struct Well {
//!     name: String,
//!     rates: Vec<f64>,
//!     open: bool,
//! }
//!
//! impl Field for Well {
//!     fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
//!         s.field(&mut self.name)?;
//!         s.field(&mut self.rates)?;
//!         s.field(&mut self.open)
//!     }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::hash::Hash;
use std::mem::{self, size_of};
use std::time::SystemTime;

use bytemuck::Pod;

use crate::bitset::Bitset;
use crate::error::{PackError, Result};
use crate::packing::{Packing, TimePoint};

/// What a serializer does with the leaves it visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerMode {
    /// Accumulate packed size
    Size,
    /// Write into a buffer
    Pack,
    /// Read from a buffer, overwriting the visited values
    Unpack,
    /// Compare against a reference without modifying the visited values
    Compare,
}

/// Visitor driven by [`Field::serialize_op`]
pub trait Serializer: Sized {
    /// Mode of this serializer.
    fn mode(&self) -> SerializerMode;

    /// Visit one leaf value.
    fn leaf<T: Packing>(&mut self, value: &mut T) -> Result<()>;

    /// Visit a container length or enum discriminant.
    ///
    /// Writing modes record `len` and return it. Unpack ignores `len` and
    /// returns the stored tag.
    fn size_tag(&mut self, len: usize) -> Result<usize>;

    /// Visit a member.
    fn field<T: Field + ?Sized>(&mut self, value: &mut T) -> Result<()> {
        value.serialize_op(self)
    }

    /// True when visited values will be overwritten.
    fn is_unpacking(&self) -> bool {
        self.mode() == SerializerMode::Unpack
    }
}

/// A type whose persisted state is a fixed sequence of members
pub trait Field {
    /// Visit every persisted member in declared order.
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()>;
}

// ============================================================================
// Leaves
// ============================================================================

macro_rules! impl_leaf_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Field for $ty {
                fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
                    s.leaf(self)
                }
            }
        )*
    };
}

impl_leaf_field!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, String,
    TimePoint, SystemTime,
);

impl<const N: usize> Field for Bitset<N> {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.leaf(self)
    }
}

impl<T: Pod, const N: usize> Field for [T; N] {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.leaf(self)
    }
}

// ============================================================================
// Containers
// ============================================================================

// Unpack grows containers one element at a time, so a corrupt length tag
// fails on the first missing element instead of allocating up front.

impl<T: Field + Default> Field for Vec<T> {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        let len = s.size_tag(self.len())?;
        if s.is_unpacking() {
            self.clear();
            for _ in 0..len {
                let mut item = T::default();
                s.field(&mut item)?;
                self.push(item);
            }
            return Ok(());
        }
        for item in self.iter_mut() {
            s.field(item)?;
        }
        Ok(())
    }
}

impl<T: Field + Default> Field for VecDeque<T> {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        let len = s.size_tag(self.len())?;
        if s.is_unpacking() {
            self.clear();
            for _ in 0..len {
                let mut item = T::default();
                s.field(&mut item)?;
                self.push_back(item);
            }
            return Ok(());
        }
        for item in self.iter_mut() {
            s.field(item)?;
        }
        Ok(())
    }
}

impl<T: Field + Default> Field for Option<T> {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        let mut present = self.is_some();
        s.leaf(&mut present)?;
        if s.is_unpacking() {
            *self = if present { Some(T::default()) } else { None };
        }
        match self {
            Some(value) => s.field(value),
            None => Ok(()),
        }
    }
}

impl<T: Field + ?Sized> Field for Box<T> {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.field(&mut **self)
    }
}

impl<A: Field, B: Field> Field for (A, B) {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.field(&mut self.0)?;
        s.field(&mut self.1)
    }
}

impl<A: Field, B: Field, C: Field> Field for (A, B, C) {
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.field(&mut self.0)?;
        s.field(&mut self.1)?;
        s.field(&mut self.2)
    }
}

/// Visit `(key, value)` entries of an ordered or pre-sorted sequence.
///
/// Entries are handed back to `rebuild` even when a visit fails, so a
/// writing pass never loses map content.
fn visit_entries<S, K, V, F>(s: &mut S, mut entries: Vec<(K, V)>, rebuild: F) -> Result<()>
where
    S: Serializer,
    K: Field,
    V: Field,
    F: FnOnce(Vec<(K, V)>),
{
    let result = entries.iter_mut().try_for_each(|(key, value)| {
        s.field(key)?;
        s.field(value)
    });
    rebuild(entries);
    result
}

fn unpack_entries<S, K, V>(s: &mut S, len: usize) -> Result<Vec<(K, V)>>
where
    S: Serializer,
    K: Field + Default,
    V: Field + Default,
{
    let mut entries = Vec::new();
    for _ in 0..len {
        let mut key = K::default();
        let mut value = V::default();
        s.field(&mut key)?;
        s.field(&mut value)?;
        entries.push((key, value));
    }
    Ok(entries)
}

impl<K, V> Field for BTreeMap<K, V>
where
    K: Field + Default + Ord,
    V: Field + Default,
{
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        let len = s.size_tag(self.len())?;
        if s.is_unpacking() {
            self.clear();
            self.extend(unpack_entries::<S, K, V>(s, len)?);
            return Ok(());
        }
        let entries: Vec<(K, V)> = mem::take(self).into_iter().collect();
        visit_entries(s, entries, |entries| self.extend(entries))
    }
}

/// Entries are visited in ascending key order so equal maps pack to
/// equal bytes.
impl<K, V> Field for HashMap<K, V>
where
    K: Field + Default + Ord + Hash,
    V: Field + Default,
{
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        let len = s.size_tag(self.len())?;
        if s.is_unpacking() {
            self.clear();
            self.extend(unpack_entries::<S, K, V>(s, len)?);
            return Ok(());
        }
        let mut entries: Vec<(K, V)> = self.drain().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        visit_entries(s, entries, |entries| self.extend(entries))
    }
}

impl<T> Field for BTreeSet<T>
where
    T: Field + Default + Ord,
{
    fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        let len = s.size_tag(self.len())?;
        if s.is_unpacking() {
            self.clear();
            for _ in 0..len {
                let mut item = T::default();
                s.field(&mut item)?;
                self.insert(item);
            }
            return Ok(());
        }
        let mut items: Vec<T> = mem::take(self).into_iter().collect();
        let result = items.iter_mut().try_for_each(|item| s.field(item));
        self.extend(items);
        result
    }
}

// ============================================================================
// Serializers
// ============================================================================

/// Sums the packed size of everything visited
#[derive(Debug, Default)]
pub struct SizeSerializer {
    total: usize,
}

impl SizeSerializer {
    /// Start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes counted so far.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Serializer for SizeSerializer {
    fn mode(&self) -> SerializerMode {
        SerializerMode::Size
    }

    fn leaf<T: Packing>(&mut self, value: &mut T) -> Result<()> {
        self.total += value.pack_size();
        Ok(())
    }

    fn size_tag(&mut self, len: usize) -> Result<usize> {
        self.total += size_of::<usize>();
        Ok(len)
    }
}

/// Writes everything visited into a buffer
#[derive(Debug)]
pub struct PackSerializer<'a> {
    buffer: &'a mut Vec<u8>,
    position: usize,
}

impl<'a> PackSerializer<'a> {
    /// Write into `buffer` starting at `position`.
    pub fn new(buffer: &'a mut Vec<u8>, position: usize) -> Self {
        Self { buffer, position }
    }

    /// Cursor after the last write.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Serializer for PackSerializer<'_> {
    fn mode(&self) -> SerializerMode {
        SerializerMode::Pack
    }

    fn leaf<T: Packing>(&mut self, value: &mut T) -> Result<()> {
        value.pack(self.buffer, &mut self.position);
        Ok(())
    }

    fn size_tag(&mut self, len: usize) -> Result<usize> {
        len.pack(self.buffer, &mut self.position);
        Ok(len)
    }
}

/// Overwrites everything visited from a buffer
///
/// Size tags above the configured cap are rejected.
#[derive(Debug)]
pub struct UnpackSerializer<'a> {
    buffer: &'a [u8],
    position: usize,
    max_sequence_len: usize,
}

impl<'a> UnpackSerializer<'a> {
    /// Read from `buffer` starting at `position`.
    pub fn new(buffer: &'a [u8], position: usize) -> Self {
        Self {
            buffer,
            position,
            max_sequence_len: usize::MAX,
        }
    }

    /// Builder: cap container lengths
    pub fn with_max_sequence_len(mut self, max_sequence_len: usize) -> Self {
        self.max_sequence_len = max_sequence_len;
        self
    }

    /// Cursor after the last read.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }
}

impl Serializer for UnpackSerializer<'_> {
    fn mode(&self) -> SerializerMode {
        SerializerMode::Unpack
    }

    fn leaf<T: Packing>(&mut self, value: &mut T) -> Result<()> {
        value.unpack(self.buffer, &mut self.position)
    }

    fn size_tag(&mut self, _len: usize) -> Result<usize> {
        let mut len = 0usize;
        len.unpack(self.buffer, &mut self.position)?;
        if len > self.max_sequence_len {
            return Err(PackError::LengthOutOfRange {
                len,
                limit: self.max_sequence_len,
                position: self.position,
            });
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Segment {
        depth: f64,
        label: String,
        flags: Bitset<4>,
    }

    impl Field for Segment {
        fn serialize_op<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
            s.field(&mut self.depth)?;
            s.field(&mut self.label)?;
            s.field(&mut self.flags)
        }
    }

    fn pack<T: Field>(value: &mut T) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut ser = PackSerializer::new(&mut buffer, 0);
        value.serialize_op(&mut ser).unwrap();
        buffer
    }

    fn size<T: Field>(value: &mut T) -> usize {
        let mut ser = SizeSerializer::new();
        value.serialize_op(&mut ser).unwrap();
        ser.total()
    }

    fn unpack<T: Field + Default>(buffer: &[u8]) -> T {
        let mut out = T::default();
        let mut ser = UnpackSerializer::new(buffer, 0);
        out.serialize_op(&mut ser).unwrap();
        assert_eq!(ser.remaining(), 0);
        out
    }

    #[test]
    fn test_member_order_is_wire_order() {
        let mut seg = Segment {
            depth: 2.5,
            label: "S1".into(),
            flags: Bitset::from(3),
        };
        let bytes = pack(&mut seg);

        assert_eq!(&bytes[0..8], &2.5f64.to_ne_bytes());
        assert_eq!(&bytes[8..16], &2usize.to_ne_bytes());
        assert_eq!(&bytes[16..18], b"S1");
        assert_eq!(&bytes[18..26], &3u64.to_ne_bytes());
        assert_eq!(size(&mut seg), bytes.len());
    }

    #[test]
    fn test_vec_round_trip() {
        let mut v = vec![
            Segment {
                depth: 1.0,
                label: "A".into(),
                flags: Bitset::new(),
            },
            Segment::default(),
        ];
        let bytes = pack(&mut v);
        assert_eq!(size(&mut v), bytes.len());
        let out: Vec<Segment> = unpack(&bytes);
        assert_eq!(out, v);
    }

    #[test]
    fn test_unpack_replaces_existing_content() {
        let mut source = vec![7i32];
        let bytes = pack(&mut source);

        let mut target = vec![1i32, 2, 3];
        let mut ser = UnpackSerializer::new(&bytes, 0);
        target.serialize_op(&mut ser).unwrap();
        assert_eq!(target, vec![7]);
    }

    #[test]
    fn test_option_presence_flag() {
        let mut none: Option<i32> = None;
        assert_eq!(pack(&mut none), vec![0u8]);

        let mut some = Some(9i32);
        let bytes = pack(&mut some);
        assert_eq!(bytes.len(), 5);
        assert_eq!(unpack::<Option<i32>>(&bytes), Some(9));
    }

    #[test]
    fn test_btree_map_survives_pack() {
        let mut map = BTreeMap::new();
        map.insert("B".to_string(), vec![2.0f64]);
        map.insert("A".to_string(), vec![]);
        let expected = map.clone();

        let bytes = pack(&mut map);
        assert_eq!(map, expected);
        assert_eq!(unpack::<BTreeMap<String, Vec<f64>>>(&bytes), expected);
    }

    #[test]
    fn test_hash_map_packs_sorted() {
        let mut a: HashMap<i32, i32> = (0..32).map(|i| (i, i * i)).collect();
        let mut b: HashMap<i32, i32> = (0..32).rev().map(|i| (i, i * i)).collect();
        let bytes_a = pack(&mut a);
        assert_eq!(bytes_a, pack(&mut b));
        assert_eq!(a.len(), 32);
        assert_eq!(unpack::<HashMap<i32, i32>>(&bytes_a), a);
    }

    #[test]
    fn test_set_deque_tuple_box() {
        let mut set: BTreeSet<u16> = [5, 1, 3].into_iter().collect();
        let bytes = pack(&mut set);
        assert_eq!(set.len(), 3);
        assert_eq!(unpack::<BTreeSet<u16>>(&bytes), set);

        let mut deque: VecDeque<(i8, String, bool)> = VecDeque::new();
        deque.push_back((1, "x".into(), true));
        let bytes = pack(&mut deque);
        assert_eq!(unpack::<VecDeque<(i8, String, bool)>>(&bytes), deque);

        let mut boxed = Box::new((3u32, 4u64));
        let bytes = pack(&mut boxed);
        assert_eq!(bytes.len(), 12);
        assert_eq!(*unpack::<Box<(u32, u64)>>(&bytes), (3, 4));
    }

    #[test]
    fn test_corrupt_length_rejected() {
        let mut buffer = Vec::new();
        let mut position = 0;
        1_000_000usize.pack(&mut buffer, &mut position);
        0i32.pack(&mut buffer, &mut position);

        let mut out: Vec<i32> = Vec::new();
        let mut ser = UnpackSerializer::new(&buffer, 0);
        let err = out.serialize_op(&mut ser).unwrap_err();
        assert_eq!(
            err,
            PackError::BufferUnderrun {
                position: size_of::<usize>() + 4,
                needed: 4,
                available: 0
            }
        );
        assert_eq!(out, vec![0]);
    }

    #[test]
    fn test_length_cap() {
        let mut v = vec![1u8, 2, 3];
        let bytes = pack(&mut v);

        let mut out: Vec<u8> = Vec::new();
        let mut ser = UnpackSerializer::new(&bytes, 0).with_max_sequence_len(2);
        let err = out.serialize_op(&mut ser).unwrap_err();
        assert_eq!(
            err,
            PackError::LengthOutOfRange {
                len: 3,
                limit: 2,
                position: size_of::<usize>()
            }
        );
    }

    #[test]
    fn test_modes() {
        let mut buffer = Vec::new();
        assert_eq!(SizeSerializer::new().mode(), SerializerMode::Size);
        assert!(!PackSerializer::new(&mut buffer, 0).is_unpacking());
        assert!(UnpackSerializer::new(&[], 0).is_unpacking());
    }
}
