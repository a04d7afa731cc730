//! Record writer
//!
//! `EclOutput` owns one file handle and appends named, typed records to
//! it in call order, either big-endian binary or formatted text.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, WriteBytesExt};
use tracing::debug;

use crate::ecl_data::{pad8, validate_name, ArrType, EclElement, HEADER_SIZE};
use crate::error::{EclError, Result};

/// Sequential writer of records to one file
#[derive(Debug)]
pub struct EclOutput {
    path: PathBuf,
    formatted: bool,
    writer: BufWriter<File>,
}

impl EclOutput {
    /// Create `path`, truncating any existing file.
    pub fn create(path: impl AsRef<Path>, formatted: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| EclError::io(&path, e))?;
        debug!(target: "opm::eclio", path = %path.display(), formatted, "Created record file");
        Ok(Self {
            path,
            formatted,
            writer: BufWriter::new(file),
        })
    }

    /// Open an existing file for appending.
    ///
    /// With `truncate_at`, the file is first cut to that length so the next
    /// record overwrites everything from that offset on.
    pub fn open_existing(path: impl AsRef<Path>, formatted: bool, truncate_at: Option<u64>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| EclError::io(&path, e))?;

        if let Some(len) = truncate_at {
            file.set_len(len).map_err(|e| EclError::io(&path, e))?;
        }
        let end = file.seek(SeekFrom::End(0)).map_err(|e| EclError::io(&path, e))?;
        debug!(target: "opm::eclio", path = %path.display(), position = end, "Reopened record file");

        Ok(Self {
            path,
            formatted,
            writer: BufWriter::new(file),
        })
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True for formatted text output.
    pub fn is_formatted(&self) -> bool {
        self.formatted
    }

    /// Write one record.
    ///
    /// The name and every CHAR element are validated before anything is
    /// written.
    pub fn write<T: EclElement>(&mut self, name: &str, data: &[T]) -> Result<()> {
        validate_name(name)?;
        for value in data {
            value.validate()?;
        }
        let count = i32::try_from(data.len()).map_err(|_| EclError::TooManyElements {
            name: name.to_string(),
            len: data.len(),
        })?;

        let result = if self.formatted {
            self.write_formatted_header(name, count, T::ARR_TYPE)
                .and_then(|_| self.write_formatted_array(data))
        } else {
            self.write_binary_header(name, count, T::ARR_TYPE)
                .and_then(|_| self.write_binary_array(data))
        };
        result.map_err(|e| EclError::io(&self.path, e))?;

        debug!(target: "opm::eclio", name, arr_type = %T::ARR_TYPE, count, "Wrote record");
        Ok(())
    }

    /// Write a MESS record, a header with no data.
    pub fn message(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;
        let result = if self.formatted {
            self.write_formatted_header(name, 0, ArrType::Mess)
        } else {
            self.write_binary_header(name, 0, ArrType::Mess)
        };
        result.map_err(|e| EclError::io(&self.path, e))?;

        debug!(target: "opm::eclio", name, "Wrote message");
        Ok(())
    }

    /// Flush buffered records to the file.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| EclError::io(&self.path, e))
    }

    fn write_binary_header(&mut self, name: &str, count: i32, arr_type: ArrType) -> io::Result<()> {
        let w = &mut self.writer;
        w.write_i32::<BigEndian>(HEADER_SIZE)?;
        w.write_all(&pad8(name))?;
        w.write_i32::<BigEndian>(count)?;
        w.write_all(arr_type.code().as_bytes())?;
        w.write_i32::<BigEndian>(HEADER_SIZE)
    }

    fn write_binary_array<T: EclElement>(&mut self, data: &[T]) -> io::Result<()> {
        let max_elements = T::ARR_TYPE.max_block_elements();
        let element_size = T::ARR_TYPE.element_size();
        let w = &mut self.writer;

        for block in data.chunks(max_elements) {
            // bounded by the 8000-byte DOUB block
            let nbytes = (block.len() * element_size) as i32;
            w.write_i32::<BigEndian>(nbytes)?;
            for value in block {
                value.write_binary(w)?;
            }
            w.write_i32::<BigEndian>(nbytes)?;
        }
        Ok(())
    }

    fn write_formatted_header(&mut self, name: &str, count: i32, arr_type: ArrType) -> io::Result<()> {
        writeln!(self.writer, " '{:<8}' {:>11} '{}'", name, count, arr_type.code())
    }

    fn write_formatted_array<T: EclElement>(&mut self, data: &[T]) -> io::Result<()> {
        let Some(layout) = T::ARR_TYPE.formatted_layout() else {
            return Ok(());
        };
        let w = &mut self.writer;

        let mut n = 0;
        for value in data {
            n += 1;
            write!(w, "{:>width$}", value.format_value(), width = layout.column_width)?;

            if n % layout.columns == 0 || n % layout.block_len == 0 {
                writeln!(w)?;
            }
            if n % layout.block_len == 0 {
                n = 0;
            }
        }
        if n % layout.columns != 0 && n % layout.block_len != 0 {
            writeln!(w)?;
        }
        Ok(())
    }
}
