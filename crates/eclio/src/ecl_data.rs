//! Record types, block layout and element encoding
//!
//! # Binary Format
//!
//! Every record starts with a 16-byte header framed by its length:
//!
//! ```text
//! [16: i32 BE][name: 8 bytes, blank padded][count: i32 BE][type: 4 bytes][16: i32 BE]
//! ```
//!
//! followed by the elements split into blocks, each framed the same way:
//!
//! ```text
//! [nbytes: i32 BE][elements, big-endian][nbytes: i32 BE]
//! ```
//!
//! # Formatted Format
//!
//! ```text
//!  'PRESSURE'           3 'DOUB'
//!    0.10000000000000D+01   0.20000000000000D+01   0.30000000000000D+01
//! ```
//!
//! Values are right-aligned in fixed-width columns, with a line break
//! after every full row and at every block boundary.

use std::fmt;
use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{EclError, Result};

/// Size of an INTE element in bytes
pub const SIZE_OF_INTE: usize = 4;
/// Size of a REAL element in bytes
pub const SIZE_OF_REAL: usize = 4;
/// Size of a DOUB element in bytes
pub const SIZE_OF_DOUB: usize = 8;
/// Size of a LOGI element in bytes
pub const SIZE_OF_LOGI: usize = 4;
/// Size of a CHAR element in bytes
pub const SIZE_OF_CHAR: usize = 8;

/// Largest binary INTE block in bytes
pub const MAX_BLOCK_SIZE_INTE: usize = 4000;
/// Largest binary REAL block in bytes
pub const MAX_BLOCK_SIZE_REAL: usize = 4000;
/// Largest binary DOUB block in bytes
pub const MAX_BLOCK_SIZE_DOUB: usize = 8000;
/// Largest binary LOGI block in bytes
pub const MAX_BLOCK_SIZE_LOGI: usize = 4000;
/// Largest binary CHAR block in bytes
pub const MAX_BLOCK_SIZE_CHAR: usize = 840;

/// On-disk LOGI true
pub const TRUE_VALUE: u32 = 0xFFFF_FFFF;
/// On-disk LOGI false
pub const FALSE_VALUE: u32 = 0;

/// Longest array name
pub const MAX_NAME_LEN: usize = 8;

/// Binary header payload length
pub const HEADER_SIZE: i32 = 16;

/// Element type of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrType {
    /// 32-bit signed integers
    Inte,
    /// 32-bit floats
    Real,
    /// 64-bit floats
    Doub,
    /// Booleans
    Logi,
    /// 8-character strings
    Char,
    /// Message marker, no data
    Mess,
}

/// Column layout of a formatted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattedLayout {
    /// Elements per block
    pub block_len: usize,
    /// Elements per line
    pub columns: usize,
    /// Characters per element
    pub column_width: usize,
}

impl ArrType {
    /// Four-character type code.
    pub fn code(&self) -> &'static str {
        match self {
            ArrType::Inte => "INTE",
            ArrType::Real => "REAL",
            ArrType::Doub => "DOUB",
            ArrType::Logi => "LOGI",
            ArrType::Char => "CHAR",
            ArrType::Mess => "MESS",
        }
    }

    /// Parse a four-character type code.
    pub fn from_code(code: &[u8]) -> Option<Self> {
        match code {
            b"INTE" => Some(ArrType::Inte),
            b"REAL" => Some(ArrType::Real),
            b"DOUB" => Some(ArrType::Doub),
            b"LOGI" => Some(ArrType::Logi),
            b"CHAR" => Some(ArrType::Char),
            b"MESS" => Some(ArrType::Mess),
            _ => None,
        }
    }

    /// Bytes per element; zero for MESS.
    pub fn element_size(&self) -> usize {
        match self {
            ArrType::Inte => SIZE_OF_INTE,
            ArrType::Real => SIZE_OF_REAL,
            ArrType::Doub => SIZE_OF_DOUB,
            ArrType::Logi => SIZE_OF_LOGI,
            ArrType::Char => SIZE_OF_CHAR,
            ArrType::Mess => 0,
        }
    }

    /// Largest binary block in bytes; zero for MESS.
    pub fn max_block_size(&self) -> usize {
        match self {
            ArrType::Inte => MAX_BLOCK_SIZE_INTE,
            ArrType::Real => MAX_BLOCK_SIZE_REAL,
            ArrType::Doub => MAX_BLOCK_SIZE_DOUB,
            ArrType::Logi => MAX_BLOCK_SIZE_LOGI,
            ArrType::Char => MAX_BLOCK_SIZE_CHAR,
            ArrType::Mess => 0,
        }
    }

    /// Largest number of elements in one binary block.
    pub fn max_block_elements(&self) -> usize {
        match self.element_size() {
            0 => 0,
            size => self.max_block_size() / size,
        }
    }

    /// Formatted column layout; `None` for MESS.
    pub fn formatted_layout(&self) -> Option<FormattedLayout> {
        let (block_len, columns, column_width) = match self {
            ArrType::Inte => (1000, 6, 12),
            ArrType::Real => (1000, 4, 17),
            ArrType::Doub => (1000, 3, 23),
            ArrType::Logi => (1000, 25, 3),
            ArrType::Char => (105, 7, 11),
            ArrType::Mess => return None,
        };
        Some(FormattedLayout {
            block_len,
            columns,
            column_width,
        })
    }

    /// Bytes of block-framed binary data following the header.
    pub fn binary_size_on_disk(&self, num: usize) -> u64 {
        let max_elements = self.max_block_elements();
        if num == 0 || max_elements == 0 {
            return 0;
        }
        let framing = 2 * SIZE_OF_INTE as u64;
        let data = (num * self.element_size()) as u64;
        let extra_blocks = ((num - 1) / max_elements) as u64;
        data + extra_blocks * framing + framing
    }

    /// Bytes of formatted text following the header line.
    pub fn formatted_size_on_disk(&self, num: usize) -> u64 {
        let Some(layout) = self.formatted_layout() else {
            return 0;
        };
        let lines = |len: usize| len.div_ceil(layout.columns);

        let full_blocks = num / layout.block_len;
        let last_block = num % layout.block_len;

        let full = full_blocks * (layout.block_len * layout.column_width + lines(layout.block_len));
        let last = last_block * layout.column_width + lines(last_block);
        (full + last) as u64
    }
}

impl fmt::Display for ArrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Array values loaded from a record file
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// INTE values
    Inte(Vec<i32>),
    /// REAL values
    Real(Vec<f32>),
    /// DOUB values
    Doub(Vec<f64>),
    /// LOGI values
    Logi(Vec<bool>),
    /// CHAR values, trailing blanks removed
    Char(Vec<String>),
    /// MESS marker
    Mess,
}

impl ArrayData {
    /// Element type.
    pub fn arr_type(&self) -> ArrType {
        match self {
            ArrayData::Inte(_) => ArrType::Inte,
            ArrayData::Real(_) => ArrType::Real,
            ArrayData::Doub(_) => ArrType::Doub,
            ArrayData::Logi(_) => ArrType::Logi,
            ArrayData::Char(_) => ArrType::Char,
            ArrayData::Mess => ArrType::Mess,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Inte(v) => v.len(),
            ArrayData::Real(v) => v.len(),
            ArrayData::Doub(v) => v.len(),
            ArrayData::Logi(v) => v.len(),
            ArrayData::Char(v) => v.len(),
            ArrayData::Mess => 0,
        }
    }

    /// True when there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for i32 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for bool {}
    impl Sealed for String {}
}

/// An element type that can be stored in a record
///
/// Implemented for `i32` (INTE), `f32` (REAL), `f64` (DOUB), `bool` (LOGI)
/// and `String` (CHAR). The trait is sealed.
pub trait EclElement: sealed::Sealed + Sized {
    /// Record type for this element.
    const ARR_TYPE: ArrType;

    /// Check the element can be encoded.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Write the big-endian binary encoding.
    fn write_binary<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    /// Formatted representation, before column alignment.
    fn format_value(&self) -> String;

    /// Borrow the values of matching loaded data.
    fn slice_of(data: &ArrayData) -> Option<&[Self]>;
}

impl EclElement for i32 {
    const ARR_TYPE: ArrType = ArrType::Inte;

    fn write_binary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i32::<BigEndian>(*self)
    }

    fn format_value(&self) -> String {
        self.to_string()
    }

    fn slice_of(data: &ArrayData) -> Option<&[Self]> {
        match data {
            ArrayData::Inte(v) => Some(v),
            _ => None,
        }
    }
}

impl EclElement for f32 {
    const ARR_TYPE: ArrType = ArrType::Real;

    fn write_binary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_f32::<BigEndian>(*self)
    }

    fn format_value(&self) -> String {
        format_real(*self)
    }

    fn slice_of(data: &ArrayData) -> Option<&[Self]> {
        match data {
            ArrayData::Real(v) => Some(v),
            _ => None,
        }
    }
}

impl EclElement for f64 {
    const ARR_TYPE: ArrType = ArrType::Doub;

    fn write_binary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_f64::<BigEndian>(*self)
    }

    fn format_value(&self) -> String {
        format_doub(*self)
    }

    fn slice_of(data: &ArrayData) -> Option<&[Self]> {
        match data {
            ArrayData::Doub(v) => Some(v),
            _ => None,
        }
    }
}

impl EclElement for bool {
    const ARR_TYPE: ArrType = ArrType::Logi;

    fn write_binary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<BigEndian>(if *self { TRUE_VALUE } else { FALSE_VALUE })
    }

    fn format_value(&self) -> String {
        String::from(if *self { "T" } else { "F" })
    }

    fn slice_of(data: &ArrayData) -> Option<&[Self]> {
        match data {
            ArrayData::Logi(v) => Some(v),
            _ => None,
        }
    }
}

impl EclElement for String {
    const ARR_TYPE: ArrType = ArrType::Char;

    fn validate(&self) -> Result<()> {
        if self.len() > SIZE_OF_CHAR || !is_record_text(self) {
            return Err(EclError::InvalidString(self.clone()));
        }
        Ok(())
    }

    fn write_binary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&pad8(self))
    }

    fn format_value(&self) -> String {
        format!("'{:<8}'", self)
    }

    fn slice_of(data: &ArrayData) -> Option<&[Self]> {
        match data {
            ArrayData::Char(v) => Some(v),
            _ => None,
        }
    }
}

/// Blank-pad a name or CHAR element to 8 bytes.
///
/// Longer input is cut at 8 bytes; callers validate length first.
pub fn pad8(value: &str) -> [u8; 8] {
    let mut out = [b' '; 8];
    let bytes = value.as_bytes();
    let len = bytes.len().min(8);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Remove trailing blanks from a CHAR element or name.
pub fn trim_char(value: &str) -> String {
    value.trim_end_matches(' ').to_string()
}

/// Printable ASCII other than `'`, the formatted-file quote.
///
/// Byte length then equals column width, for binary and formatted files alike.
fn is_record_text(value: &str) -> bool {
    value.bytes().all(|b| (b == b' ' || b.is_ascii_graphic()) && b != b'\'')
}

/// Check an array name fits the 8-character header field.
pub fn validate_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN || !is_record_text(name) {
        return Err(EclError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Split `{:e}` output into sign, mantissa digits and exponent.
fn scientific_parts(formatted: &str) -> Option<(&'static str, String, i32)> {
    let (mantissa, exponent) = formatted.split_once('e')?;
    let exponent: i32 = exponent.parse().ok()?;
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    Some((sign, digits, exponent))
}

/// REAL text form: `0.dddddddd` mantissa and a signed two-digit exponent.
///
/// `3.1` becomes `0.31000001E+01`; zero is `0.00000000E+00`.
pub fn format_real(value: f32) -> String {
    if value == 0.0 {
        return "0.00000000E+00".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    match scientific_parts(&format!("{:.7e}", value)) {
        Some((sign, digits, exp)) => format!("{sign}0.{digits}E{:+03}", exp + 1),
        None => value.to_string(),
    }
}

/// DOUB text form: 14 mantissa digits and a `D` exponent.
///
/// The `D` is dropped when the exponent needs three digits, so
/// `1.0e-120` becomes `0.10000000000000-119`.
pub fn format_doub(value: f64) -> String {
    if value == 0.0 {
        return "0.00000000000000D+00".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    match scientific_parts(&format!("{:.13e}", value)) {
        Some((sign, digits, exp)) => {
            let marker = if exp.abs() < 100 { "D" } else { "" };
            format!("{sign}0.{digits}{marker}{:+03}", exp + 1)
        }
        None => value.to_string(),
    }
}
