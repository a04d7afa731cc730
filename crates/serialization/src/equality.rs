//! Persisted-state equality
//!
//! Two values are persisted-equal when every leaf they visit packs to the
//! same bytes. The left value is packed once as a reference; the right
//! value is then walked with an [`EqualitySerializer`] that compares each
//! leaf in place and records the first leaf that differs.

use std::mem::size_of;

use crate::error::Result;
use crate::packing::Packing;
use crate::serializer::{Field, PackSerializer, Serializer, SerializerMode, SizeSerializer};

/// Location of the first difference between two persisted values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divergence {
    /// Zero-based index of the leaf or size tag that differs
    pub leaf_index: usize,
    /// Byte offset of that leaf in the packed reference
    pub offset: usize,
}

/// Outcome of [`compare_persisted`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Identical packed state
    Equal,
    /// First difference found
    Differ(Divergence),
}

impl Comparison {
    /// True for [`Comparison::Equal`].
    pub fn is_equal(&self) -> bool {
        matches!(self, Comparison::Equal)
    }
}

/// Compares visited leaves against a packed reference
#[derive(Debug)]
pub struct EqualitySerializer<'a> {
    reference: &'a [u8],
    position: usize,
    leaf_index: usize,
    scratch: Vec<u8>,
    divergence: Option<Divergence>,
}

impl<'a> EqualitySerializer<'a> {
    /// Compare against `reference`, the packed form of the other value.
    pub fn new(reference: &'a [u8]) -> Self {
        Self {
            reference,
            position: 0,
            leaf_index: 0,
            scratch: Vec::new(),
            divergence: None,
        }
    }

    /// First difference seen so far.
    pub fn divergence(&self) -> Option<Divergence> {
        self.divergence
    }

    /// Result of the walk, including a length difference at the end.
    pub fn finish(self) -> Comparison {
        match self.divergence {
            Some(d) => Comparison::Differ(d),
            None if self.position != self.reference.len() => Comparison::Differ(Divergence {
                leaf_index: self.leaf_index,
                offset: self.position,
            }),
            None => Comparison::Equal,
        }
    }

    fn compare<T: Packing>(&mut self, value: &T) {
        self.scratch.clear();
        let mut len = 0;
        value.pack(&mut self.scratch, &mut len);

        if self.divergence.is_none() {
            let end = self.position + len;
            let same = self
                .reference
                .get(self.position..end)
                .is_some_and(|expected| expected == self.scratch.as_slice());
            if !same {
                self.divergence = Some(Divergence {
                    leaf_index: self.leaf_index,
                    offset: self.position,
                });
            }
        }

        self.position += len;
        self.leaf_index += 1;
    }
}

impl Serializer for EqualitySerializer<'_> {
    fn mode(&self) -> SerializerMode {
        SerializerMode::Compare
    }

    fn leaf<T: Packing>(&mut self, value: &mut T) -> Result<()> {
        self.compare(&*value);
        Ok(())
    }

    fn size_tag(&mut self, len: usize) -> Result<usize> {
        debug_assert_eq!(len.pack_size(), size_of::<usize>());
        self.compare(&len);
        Ok(len)
    }
}

/// Compare the persisted state of two values.
pub fn compare_persisted<T: Field>(left: &mut T, right: &mut T) -> Result<Comparison> {
    let mut sizer = SizeSerializer::new();
    left.serialize_op(&mut sizer)?;

    let mut reference = Vec::with_capacity(sizer.total());
    let mut packer = PackSerializer::new(&mut reference, 0);
    left.serialize_op(&mut packer)?;

    let mut cmp = EqualitySerializer::new(&reference);
    right.serialize_op(&mut cmp)?;
    Ok(cmp.finish())
}

/// True when both values pack to identical bytes.
pub fn persisted_eq<T: Field>(left: &mut T, right: &mut T) -> Result<bool> {
    Ok(compare_persisted(left, right)?.is_equal())
}
