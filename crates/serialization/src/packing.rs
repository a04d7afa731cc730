//! Leaf packing primitives
//!
//! Every type that can be stored as a single leaf of the in-memory pack
//! format implements [`Packing`]. There are two families:
//!
//! - POD values (the primitive numbers, `bool`, `char` and fixed arrays of
//!   [`Pod`] elements), stored as their raw native-endian bytes.
//! - A closed set of non-POD values with an explicit encoding:
//!   `String` (`usize` length + bytes), time points (`i64` seconds since the
//!   epoch) and [`Bitset`](crate::Bitset) (`u64`, see `bitset.rs`).
//!
//! Any other type has no impl, so packing it fails to compile.
//!
//! # Binary Format
//!
//! ```text
//! POD        [raw bytes, size_of::<T>()]
//! String     [usize length][bytes, no terminator]
//! time point [i64 time_t]
//! ```
//!
//! Nothing here converts byte order. The in-memory format never leaves
//! the architecture that produced it.

use std::mem::size_of;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytemuck::Pod;
use chrono::{DateTime, Utc};

use crate::error::{PackError, Result};

/// Seconds since the Unix epoch, the packed form of every time point
#[allow(non_camel_case_types)]
pub type time_t = i64;

/// Calendar time point used by the simulator state model
pub type TimePoint = DateTime<Utc>;

/// A value that can be sized, packed and unpacked as one leaf
pub trait Packing {
    /// Number of bytes [`pack`](Packing::pack) will write.
    fn pack_size(&self) -> usize;

    /// Write the value at `position` and advance it.
    ///
    /// The buffer grows if it is too short.
    fn pack(&self, buffer: &mut Vec<u8>, position: &mut usize);

    /// Overwrite `self` with the value stored at `position` and advance it.
    fn unpack(&mut self, buffer: &[u8], position: &mut usize) -> Result<()>;
}

// ============================================================================
// Raw byte movement
// ============================================================================

/// Copy `bytes` into `buffer` at `position`, growing the buffer as needed.
pub(crate) fn write_bytes(buffer: &mut Vec<u8>, position: &mut usize, bytes: &[u8]) {
    let end = *position + bytes.len();
    if buffer.len() < end {
        buffer.resize(end, 0);
    }
    buffer[*position..end].copy_from_slice(bytes);
    *position = end;
}

/// Borrow `len` bytes of `buffer` at `position` and advance it.
pub(crate) fn read_bytes<'a>(buffer: &'a [u8], position: &mut usize, len: usize) -> Result<&'a [u8]> {
    let available = buffer.len().saturating_sub(*position);
    if len > available {
        return Err(PackError::BufferUnderrun {
            position: *position,
            needed: len,
            available,
        });
    }
    let bytes = &buffer[*position..*position + len];
    *position += len;
    Ok(bytes)
}

/// Size of `n` POD elements.
pub fn pod_slice_size<T: Pod>(data: &[T]) -> usize {
    std::mem::size_of_val(data)
}

/// Pack a slice of POD elements as one contiguous block.
pub fn pack_pod_slice<T: Pod>(data: &[T], buffer: &mut Vec<u8>, position: &mut usize) {
    write_bytes(buffer, position, bytemuck::cast_slice(data));
}

/// Unpack `data.len()` POD elements into `data`.
pub fn unpack_pod_slice<T: Pod>(data: &mut [T], buffer: &[u8], position: &mut usize) -> Result<()> {
    let bytes = read_bytes(buffer, position, std::mem::size_of_val(data))?;
    bytemuck::cast_slice_mut::<T, u8>(data).copy_from_slice(bytes);
    Ok(())
}

// ============================================================================
// POD scalars
// ============================================================================

macro_rules! impl_pod_packing {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Packing for $ty {
                fn pack_size(&self) -> usize {
                    size_of::<$ty>()
                }

                fn pack(&self, buffer: &mut Vec<u8>, position: &mut usize) {
                    pack_pod_slice(std::slice::from_ref(self), buffer, position);
                }

                fn unpack(&mut self, buffer: &[u8], position: &mut usize) -> Result<()> {
                    unpack_pod_slice(std::slice::from_mut(self), buffer, position)
                }
            }
        )*
    };
}

impl_pod_packing!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

impl<T: Pod, const N: usize> Packing for [T; N] {
    fn pack_size(&self) -> usize {
        pod_slice_size(self.as_slice())
    }

    fn pack(&self, buffer: &mut Vec<u8>, position: &mut usize) {
        pack_pod_slice(self.as_slice(), buffer, position);
    }

    fn unpack(&mut self, buffer: &[u8], position: &mut usize) -> Result<()> {
        unpack_pod_slice(self.as_mut_slice(), buffer, position)
    }
}

// bool and char are plain data but not every bit pattern is a valid value,
// so unpack validates instead of transmuting.

impl Packing for bool {
    fn pack_size(&self) -> usize {
        size_of::<u8>()
    }

    fn pack(&self, buffer: &mut Vec<u8>, position: &mut usize) {
        u8::from(*self).pack(buffer, position);
    }

    fn unpack(&mut self, buffer: &[u8], position: &mut usize) -> Result<()> {
        let start = *position;
        let mut byte = 0u8;
        byte.unpack(buffer, position)?;
        *self = match byte {
            0 => false,
            1 => true,
            value => {
                return Err(PackError::InvalidBool {
                    value,
                    position: start,
                })
            }
        };
        Ok(())
    }
}

impl Packing for char {
    fn pack_size(&self) -> usize {
        size_of::<u32>()
    }

    fn pack(&self, buffer: &mut Vec<u8>, position: &mut usize) {
        u32::from(*self).pack(buffer, position);
    }

    fn unpack(&mut self, buffer: &[u8], position: &mut usize) -> Result<()> {
        let mut value = 0u32;
        value.unpack(buffer, position)?;
        *self = char::from_u32(value).ok_or(PackError::InvalidChar { value })?;
        Ok(())
    }
}

// ============================================================================
// Non-POD specializations
// ============================================================================

impl Packing for String {
    fn pack_size(&self) -> usize {
        size_of::<usize>() + self.len()
    }

    fn pack(&self, buffer: &mut Vec<u8>, position: &mut usize) {
        self.len().pack(buffer, position);
        pack_pod_slice(self.as_bytes(), buffer, position);
    }

    fn unpack(&mut self, buffer: &[u8], position: &mut usize) -> Result<()> {
        let mut len = 0usize;
        len.unpack(buffer, position)?;
        let start = *position;
        let bytes = read_bytes(buffer, position, len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| PackError::InvalidUtf8 { position: start })?;
        self.clear();
        self.push_str(text);
        Ok(())
    }
}

/// Convert a time point to whole seconds since the epoch, rounding down.
pub fn to_time_t(t: &TimePoint) -> time_t {
    t.timestamp()
}

/// Rebuild a time point from whole seconds since the epoch.
pub fn from_time_t(seconds: time_t) -> Result<TimePoint> {
    DateTime::<Utc>::from_timestamp(seconds, 0).ok_or(PackError::TimeOutOfRange { seconds })
}

impl Packing for TimePoint {
    fn pack_size(&self) -> usize {
        size_of::<time_t>()
    }

    fn pack(&self, buffer: &mut Vec<u8>, position: &mut usize) {
        to_time_t(self).pack(buffer, position);
    }

    fn unpack(&mut self, buffer: &[u8], position: &mut usize) -> Result<()> {
        let mut seconds: time_t = 0;
        seconds.unpack(buffer, position)?;
        *self = from_time_t(seconds)?;
        Ok(())
    }
}

/// Whole seconds between the epoch and `t`, rounding towards the past.
pub fn system_time_to_time_t(t: &SystemTime) -> time_t {
    match t.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs() as time_t,
        Err(err) => {
            let before = err.duration();
            let whole = -(before.as_secs() as time_t);
            if before.subsec_nanos() > 0 {
                whole - 1
            } else {
                whole
            }
        }
    }
}

/// Rebuild a `SystemTime` from whole seconds since the epoch.
pub fn system_time_from_time_t(seconds: time_t) -> Result<SystemTime> {
    let offset = Duration::from_secs(seconds.unsigned_abs());
    let time = if seconds >= 0 {
        UNIX_EPOCH.checked_add(offset)
    } else {
        UNIX_EPOCH.checked_sub(offset)
    };
    time.ok_or(PackError::TimeOutOfRange { seconds })
}

impl Packing for SystemTime {
    fn pack_size(&self) -> usize {
        size_of::<time_t>()
    }

    fn pack(&self, buffer: &mut Vec<u8>, position: &mut usize) {
        system_time_to_time_t(self).pack(buffer, position);
    }

    fn unpack(&mut self, buffer: &[u8], position: &mut usize) -> Result<()> {
        let mut seconds: time_t = 0;
        seconds.unpack(buffer, position)?;
        *self = system_time_from_time_t(seconds)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn round_trip<T: Packing + Default + PartialEq + std::fmt::Debug>(value: T) -> T {
        let mut buffer = Vec::new();
        let mut position = 0;
        value.pack(&mut buffer, &mut position);
        assert_eq!(position, value.pack_size());
        assert_eq!(buffer.len(), value.pack_size());

        let mut out = T::default();
        let mut read_pos = 0;
        out.unpack(&buffer, &mut read_pos).unwrap();
        assert_eq!(read_pos, position);
        out
    }

    #[test]
    fn test_pack_i32_is_four_native_bytes() {
        let mut buffer = Vec::new();
        let mut position = 0;
        42i32.pack(&mut buffer, &mut position);

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer, 42i32.to_ne_bytes());

        let mut value = 0i32;
        let mut read_pos = 0;
        value.unpack(&buffer, &mut read_pos).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_scalars_round_trip() {
        assert_eq!(round_trip(u8::MAX), u8::MAX);
        assert_eq!(round_trip(-7i64), -7);
        assert_eq!(round_trip(usize::MAX - 3), usize::MAX - 3);
        assert_eq!(round_trip(1.5f32), 1.5);
        assert_eq!(round_trip(-0.0f64).to_bits(), (-0.0f64).to_bits());
        assert!(round_trip(true));
        assert_eq!(round_trip('\u{2603}'), '\u{2603}');
    }

    #[test]
    fn test_nan_payload_preserved() {
        let nan = f64::from_bits(0x7ff8_0000_dead_beef);
        let out = round_trip(nan);
        assert_eq!(out.to_bits(), nan.to_bits());
    }

    #[test]
    fn test_pod_array_round_trip() {
        let arr = [1u16, 2, 3, 65535];
        let mut buffer = Vec::new();
        let mut position = 0;
        arr.pack(&mut buffer, &mut position);
        assert_eq!(position, 8);

        let mut out = [0u16; 4];
        let mut read_pos = 0;
        out.unpack(&buffer, &mut read_pos).unwrap();
        assert_eq!(out, arr);
    }

    #[test]
    fn test_empty_slice_is_noop() {
        let data: [f64; 0] = [];
        let mut buffer = vec![9u8; 3];
        let mut position = 1;
        pack_pod_slice(&data, &mut buffer, &mut position);
        assert_eq!(position, 1);
        assert_eq!(buffer, vec![9, 9, 9]);

        let mut out: [f64; 0] = [];
        unpack_pod_slice(&mut out, &buffer, &mut position).unwrap();
        assert_eq!(position, 1);
    }

    #[test]
    fn test_pack_writes_at_position_and_grows() {
        let mut buffer = vec![0xAAu8; 2];
        let mut position = 1;
        7u32.pack(&mut buffer, &mut position);
        assert_eq!(position, 5);
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer[0], 0xAA);
        assert_eq!(&buffer[1..], &7u32.to_ne_bytes());
    }

    #[test]
    fn test_unpack_underrun() {
        let buffer = vec![1u8, 2, 3];
        let mut position = 0;
        let mut value = 0u32;
        let err = value.unpack(&buffer, &mut position).unwrap_err();
        assert_eq!(
            err,
            PackError::BufferUnderrun {
                position: 0,
                needed: 4,
                available: 3
            }
        );
        assert_eq!(position, 0);
    }

    #[test]
    fn test_string_layout() {
        let s = String::from("OP_1");
        let mut buffer = Vec::new();
        let mut position = 0;
        s.pack(&mut buffer, &mut position);

        assert_eq!(s.pack_size(), size_of::<usize>() + 4);
        assert_eq!(&buffer[..size_of::<usize>()], &4usize.to_ne_bytes());
        assert_eq!(&buffer[size_of::<usize>()..], b"OP_1");
        assert_eq!(round_trip(s.clone()), s);
    }

    #[test]
    fn test_string_with_nul_and_empty() {
        assert_eq!(round_trip(String::new()), "");
        let with_nul = String::from("A\0B\0");
        let out = round_trip(with_nul.clone());
        assert_eq!(out.len(), 4);
        assert_eq!(out, with_nul);
    }

    #[test]
    fn test_string_invalid_utf8() {
        let mut buffer = Vec::new();
        let mut position = 0;
        2usize.pack(&mut buffer, &mut position);
        buffer.extend_from_slice(&[0xC3, 0x28]);

        let mut out = String::new();
        let mut read_pos = 0;
        let err = out.unpack(&buffer, &mut read_pos).unwrap_err();
        assert!(matches!(err, PackError::InvalidUtf8 { .. }));
    }

    #[test]
    fn test_invalid_bool() {
        let buffer = vec![2u8];
        let mut value = false;
        let err = value.unpack(&buffer, &mut 0).unwrap_err();
        assert_eq!(err, PackError::InvalidBool { value: 2, position: 0 });
    }

    #[test]
    fn test_time_point_whole_seconds() {
        let t = Utc.with_ymd_and_hms(2019, 7, 4, 12, 30, 15).unwrap();
        assert_eq!(round_trip(t), t);
        assert_eq!(t.pack_size(), size_of::<time_t>());
    }

    #[test]
    fn test_time_point_drops_subsecond() {
        let whole = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 1).unwrap();
        let t = whole + chrono::Duration::milliseconds(750);
        assert_eq!(round_trip(t), whole);
    }

    #[test]
    fn test_system_time_before_epoch_floors() {
        let t = UNIX_EPOCH - Duration::from_millis(1500);
        assert_eq!(system_time_to_time_t(&t), -2);
        let t = UNIX_EPOCH - Duration::from_secs(3);
        assert_eq!(system_time_to_time_t(&t), -3);
        assert_eq!(system_time_from_time_t(-3).unwrap(), t);
    }

    #[test]
    fn test_system_time_round_trip() {
        let t = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        let mut buffer = Vec::new();
        let mut position = 0;
        t.pack(&mut buffer, &mut position);
        let mut out = UNIX_EPOCH;
        out.unpack(&buffer, &mut 0).unwrap();
        assert_eq!(out, t);
    }
}
