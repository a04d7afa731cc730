//! Record file reader
//!
//! Opening a file scans every record header and remembers where its data
//! starts. Array data is only read on request, through one of the
//! `load_*` methods, and then borrowed with [`EclFile::get`].
//!
//! Binary vs. formatted is decided by the file extension: an extension
//! starting with `F` or `A` (`FUNRST`, `F0013`, `FINIT`) is formatted.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};
use tracing::debug;

use crate::ecl_data::{trim_char, ArrType, ArrayData, EclElement, FALSE_VALUE, HEADER_SIZE, TRUE_VALUE};
use crate::error::{invalid_data, EclError, Result};

/// Name, type and element count of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EclEntry {
    /// Array name, trailing blanks removed
    pub name: String,
    /// Element type
    pub arr_type: ArrType,
    /// Element count
    pub size: usize,
}

#[derive(Debug, Clone)]
struct ArrayHeader {
    name: String,
    arr_type: ArrType,
    size: usize,
    header_offset: u64,
    data_offset: u64,
}

/// True when `path` names a formatted file.
pub fn is_formatted_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.chars().next())
        .is_some_and(|c| c == 'F' || c == 'A')
}

/// Index of the records in one file, with lazily loaded data
#[derive(Debug)]
pub struct EclFile {
    path: PathBuf,
    formatted: bool,
    arrays: Vec<ArrayHeader>,
    index: HashMap<String, usize>,
    data: Vec<Option<ArrayData>>,
}

impl EclFile {
    /// Scan the record headers of `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let formatted = is_formatted_path(&path);

        let file = File::open(&path).map_err(|e| EclError::io(&path, e))?;
        let file_len = file.metadata().map_err(|e| EclError::io(&path, e))?.len();
        let mut reader = BufReader::new(file);

        let mut arrays = Vec::new();
        let mut index = HashMap::new();
        let mut header_offset = 0u64;

        while header_offset < file_len {
            let (name, arr_type, size) = if formatted {
                read_formatted_header(&mut reader)
            } else {
                read_binary_header(&mut reader)
            }
            .map_err(|e| EclError::decode(&path, header_offset, e))?;

            let data_offset = reader.stream_position().map_err(|e| EclError::io(&path, e))?;
            let data_len = if formatted {
                arr_type.formatted_size_on_disk(size)
            } else {
                arr_type.binary_size_on_disk(size)
            };
            let next = data_offset + data_len;
            if next > file_len {
                return Err(EclError::Malformed {
                    path,
                    offset: header_offset,
                    reason: format!("array '{}' extends past end of file", name),
                });
            }
            reader
                .seek(SeekFrom::Start(next))
                .map_err(|e| EclError::io(&path, e))?;

            index.insert(name.clone(), arrays.len());
            arrays.push(ArrayHeader {
                name,
                arr_type,
                size,
                header_offset,
                data_offset,
            });
            header_offset = next;
        }

        debug!(target: "opm::eclio", path = %path.display(), arrays = arrays.len(), formatted, "Indexed record file");

        let data = vec![None; arrays.len()];
        Ok(Self {
            path,
            formatted,
            arrays,
            index,
            data,
        })
    }

    /// File being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True for formatted text input.
    pub fn is_formatted(&self) -> bool {
        self.formatted
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// True for a file with no records.
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Every record in file order.
    pub fn get_list(&self) -> Vec<EclEntry> {
        self.arrays.iter().map(ArrayHeader::entry).collect()
    }

    /// Record at `index`.
    pub fn entry(&self, index: usize) -> Result<EclEntry> {
        self.header(index).map(ArrayHeader::entry)
    }

    /// True when some record has this name.
    pub fn has_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Index of the last record with this name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// True when the data of record `index` is in memory.
    pub fn is_loaded(&self, index: usize) -> bool {
        matches!(self.data.get(index), Some(Some(_)))
    }

    /// Load every record.
    pub fn load_data(&mut self) -> Result<()> {
        let indices: Vec<usize> = (0..self.arrays.len()).collect();
        self.load_data_by_index(&indices)
    }

    /// Load every record named `name`.
    pub fn load_data_by_name(&mut self, name: &str) -> Result<()> {
        let indices: Vec<usize> = self
            .arrays
            .iter()
            .enumerate()
            .filter(|(_, a)| a.name == name)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return Err(EclError::KeyNotFound(name.to_string()));
        }
        self.load_data_by_index(&indices)
    }

    /// Load the listed records.
    pub fn load_data_by_index(&mut self, indices: &[usize]) -> Result<()> {
        for &i in indices {
            self.header(i)?;
        }
        if indices.is_empty() {
            return Ok(());
        }

        let file = File::open(&self.path).map_err(|e| EclError::io(&self.path, e))?;
        let mut reader = BufReader::new(file);
        for &i in indices {
            let header = &self.arrays[i];
            let data = read_array(&mut reader, header, self.formatted)
                .map_err(|e| EclError::decode(&self.path, header.header_offset, e))?;
            self.data[i] = Some(data);
        }
        Ok(())
    }

    /// Load the record at `index`.
    pub fn load_array(&mut self, index: usize) -> Result<()> {
        self.load_data_by_index(&[index])
    }

    /// Borrow the values of record `index`.
    pub fn get<T: EclElement>(&self, index: usize) -> Result<&[T]> {
        let header = self.header(index)?;
        if header.arr_type != T::ARR_TYPE {
            return Err(EclError::TypeMismatch {
                name: header.name.clone(),
                expected: T::ARR_TYPE,
                found: header.arr_type,
            });
        }
        let data = self.data[index]
            .as_ref()
            .ok_or_else(|| EclError::NotLoaded(header.name.clone()))?;
        T::slice_of(data).ok_or_else(|| EclError::TypeMismatch {
            name: header.name.clone(),
            expected: T::ARR_TYPE,
            found: data.arr_type(),
        })
    }

    /// Borrow the values of the last record named `name`.
    pub fn get_by_name<T: EclElement>(&self, name: &str) -> Result<&[T]> {
        let index = self
            .index_of(name)
            .ok_or_else(|| EclError::KeyNotFound(name.to_string()))?;
        self.get(index)
    }

    /// Byte offset of the header of record `index`.
    pub fn header_offset(&self, index: usize) -> Result<u64> {
        self.header(index).map(|h| h.header_offset)
    }

    fn header(&self, index: usize) -> Result<&ArrayHeader> {
        self.arrays.get(index).ok_or(EclError::IndexOutOfRange {
            index,
            len: self.arrays.len(),
        })
    }
}

impl ArrayHeader {
    fn entry(&self) -> EclEntry {
        EclEntry {
            name: self.name.clone(),
            arr_type: self.arr_type,
            size: self.size,
        }
    }
}

// ============================================================================
// Headers
// ============================================================================

fn read_binary_header<R: Read>(reader: &mut R) -> io::Result<(String, ArrType, usize)> {
    let head = reader.read_i32::<BigEndian>()?;
    if head != HEADER_SIZE {
        return Err(invalid_data(format!("header length {} is not {}", head, HEADER_SIZE)));
    }

    let mut name = [0u8; 8];
    reader.read_exact(&mut name)?;
    let count = reader.read_i32::<BigEndian>()?;
    let mut code = [0u8; 4];
    reader.read_exact(&mut code)?;

    let tail = reader.read_i32::<BigEndian>()?;
    if tail != HEADER_SIZE {
        return Err(invalid_data(format!("header tail {} is not {}", tail, HEADER_SIZE)));
    }

    let name = trim_char(&String::from_utf8_lossy(&name));
    let arr_type = ArrType::from_code(&code).ok_or_else(|| {
        invalid_data(format!(
            "unknown array type '{}'",
            String::from_utf8_lossy(&code)
        ))
    })?;
    let size = checked_count(count, arr_type)?;
    Ok((name, arr_type, size))
}

fn read_formatted_header<R: BufRead>(reader: &mut R) -> io::Result<(String, ArrType, usize)> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "missing header line"));
    }

    let fields: Vec<&str> = line.split('\'').collect();
    if fields.len() < 5 {
        return Err(invalid_data("header name and type should be enclosed with '"));
    }
    let (name, count, code) = (fields[1], fields[2].trim(), fields[3]);

    if name.len() != 8 {
        return Err(invalid_data("header name should be 8 characters"));
    }
    let count: i32 = count
        .parse()
        .map_err(|_| invalid_data(format!("invalid element count '{}'", count)))?;
    let arr_type = ArrType::from_code(code.as_bytes())
        .ok_or_else(|| invalid_data(format!("unknown array type '{}'", code)))?;
    let size = checked_count(count, arr_type)?;
    Ok((trim_char(name), arr_type, size))
}

fn checked_count(count: i32, arr_type: ArrType) -> io::Result<usize> {
    let size = usize::try_from(count).map_err(|_| invalid_data(format!("negative element count {}", count)))?;
    if arr_type == ArrType::Mess && size > 0 {
        return Err(invalid_data("type MESS can not have size > 0"));
    }
    Ok(size)
}

// ============================================================================
// Array data
// ============================================================================

fn read_array<R: BufRead + Seek>(reader: &mut R, header: &ArrayHeader, formatted: bool) -> io::Result<ArrayData> {
    reader.seek(SeekFrom::Start(header.data_offset))?;
    let (arr_type, n) = (header.arr_type, header.size);

    let data = if formatted {
        match arr_type {
            ArrType::Inte => ArrayData::Inte(read_formatted_tokens(reader, n, parse_inte)?),
            ArrType::Real => ArrayData::Real(read_formatted_tokens(reader, n, parse_real)?),
            ArrType::Doub => ArrayData::Doub(read_formatted_tokens(reader, n, parse_doub)?),
            ArrType::Logi => ArrayData::Logi(read_formatted_tokens(reader, n, parse_logi)?),
            ArrType::Char => ArrayData::Char(read_formatted_chars(reader, n)?),
            ArrType::Mess => ArrayData::Mess,
        }
    } else {
        match arr_type {
            ArrType::Inte => ArrayData::Inte(read_binary_blocks(reader, arr_type, n, |r| {
                r.read_i32::<BigEndian>()
            })?),
            ArrType::Real => ArrayData::Real(read_binary_blocks(reader, arr_type, n, |r| {
                r.read_f32::<BigEndian>()
            })?),
            ArrType::Doub => ArrayData::Doub(read_binary_blocks(reader, arr_type, n, |r| {
                r.read_f64::<BigEndian>()
            })?),
            ArrType::Logi => ArrayData::Logi(read_binary_blocks(reader, arr_type, n, |r| {
                match r.read_u32::<BigEndian>()? {
                    TRUE_VALUE => Ok(true),
                    FALSE_VALUE => Ok(false),
                    other => Err(invalid_data(format!("invalid LOGI value {:#010x}", other))),
                }
            })?),
            ArrType::Char => ArrayData::Char(read_binary_blocks(reader, arr_type, n, |r| {
                let mut value = [0u8; 8];
                r.read_exact(&mut value)?;
                Ok(trim_char(&String::from_utf8_lossy(&value)))
            })?),
            ArrType::Mess => ArrayData::Mess,
        }
    };
    Ok(data)
}

fn read_binary_blocks<R, T, F>(reader: &mut R, arr_type: ArrType, count: usize, mut read_one: F) -> io::Result<Vec<T>>
where
    R: Read,
    F: FnMut(&mut R) -> io::Result<T>,
{
    let element_size = arr_type.element_size();
    let max_elements = arr_type.max_block_elements();
    let mut values = Vec::with_capacity(count);
    let mut rest = count;

    while rest > 0 {
        let head = reader.read_i32::<BigEndian>()?;
        let num = usize::try_from(head)
            .ok()
            .filter(|bytes| bytes % element_size == 0)
            .map(|bytes| bytes / element_size)
            .filter(|num| *num > 0 && *num <= max_elements)
            .ok_or_else(|| invalid_data("inconsistent block header or incorrect number of elements"))?;

        if num > rest || (num < max_elements && num != rest) {
            return Err(invalid_data("incorrect number of elements in block"));
        }

        for _ in 0..num {
            values.push(read_one(reader)?);
        }
        rest -= num;

        let tail = reader.read_i32::<BigEndian>()?;
        if tail != head {
            return Err(invalid_data("block tail not matching header"));
        }
    }
    Ok(values)
}

fn read_formatted_tokens<R, T, F>(reader: &mut R, count: usize, parse: F) -> io::Result<Vec<T>>
where
    R: BufRead,
    F: Fn(&str) -> io::Result<T>,
{
    let mut values = Vec::with_capacity(count);
    let mut line = String::new();

    while values.len() < count {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of file reached when reading array",
            ));
        }
        for token in line.split_whitespace() {
            values.push(parse(token)?);
        }
    }
    if values.len() > count {
        return Err(invalid_data(format!("expected {} values, found {}", count, values.len())));
    }
    Ok(values)
}

fn read_formatted_chars<R: BufRead>(reader: &mut R, count: usize) -> io::Result<Vec<String>> {
    let mut values = Vec::with_capacity(count);
    let mut line = String::new();

    while values.len() < count {
        line.clear();
        if reader.read_line(&mut line)? == 0 || line.trim().is_empty() {
            return Err(invalid_data(format!(
                "end of file or blank line, read {} of {} CHAR elements",
                values.len(),
                count
            )));
        }

        let parts: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\'').collect();
        if parts.len() < 3 || parts.len() % 2 == 0 {
            return Err(invalid_data("all CHAR elements must be enclosed by apostrophes"));
        }
        for value in parts.iter().skip(1).step_by(2) {
            if value.len() != 8 {
                return Err(invalid_data("all CHAR elements should have 8 characters"));
            }
            values.push(trim_char(value));
        }
    }
    if values.len() > count {
        return Err(invalid_data(format!("expected {} values, found {}", count, values.len())));
    }
    Ok(values)
}

fn parse_inte(token: &str) -> io::Result<i32> {
    token
        .parse()
        .map_err(|_| invalid_data(format!("could not convert '{}' to INTE", token)))
}

fn parse_real(token: &str) -> io::Result<f32> {
    // parsed wide: some writers emit values outside the f32 range
    let value: f64 = token
        .parse()
        .map_err(|_| invalid_data(format!("could not convert '{}' to REAL", token)))?;
    Ok(value as f32)
}

/// Parse `0.dddD+XX`, or `0.ddd+XXX` where the `D` was dropped.
fn parse_doub(token: &str) -> io::Result<f64> {
    let fail = || invalid_data(format!("could not convert '{}' to DOUB", token));

    if let Some(p) = token.find(|c: char| c == 'D' || c == 'd') {
        let mut value = token.to_string();
        value.replace_range(p..p + 1, "E");
        return value.parse().map_err(|_| fail());
    }
    if let Ok(value) = token.parse() {
        return Ok(value);
    }
    let p = token
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '-' || *c == '+')
        .map(|(i, _)| i)
        .ok_or_else(fail)?;
    let mut value = token.to_string();
    value.insert(p, 'E');
    value.parse().map_err(|_| fail())
}

fn parse_logi(token: &str) -> io::Result<bool> {
    match token {
        "T" => Ok(true),
        "F" => Ok(false),
        _ => Err(invalid_data(format!("could not convert '{}' to LOGI", token))),
    }
}
