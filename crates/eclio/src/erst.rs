//! Restart file reader
//!
//! A unified restart file is a sequence of report steps, each opened by a
//! `SEQNUM` record holding the step number. `ERst` groups the records of
//! an [`EclFile`] by step and loads them one step at a time.

use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;

use tracing::debug;

use crate::ecl_data::{ArrType, EclElement};
use crate::ecl_file::EclFile;
use crate::error::{EclError, Result};

/// Name of the record that starts each report step
pub const SEQNUM: &str = "SEQNUM";

#[derive(Debug, Clone)]
struct ReportStep {
    seqnum: i32,
    arrays: Range<usize>,
}

/// Report step index over a restart file
#[derive(Debug)]
pub struct ERst {
    file: EclFile,
    steps: Vec<ReportStep>,
    loaded: HashSet<i32>,
}

impl ERst {
    /// Open `path` and index its report steps.
    ///
    /// A file without any `SEQNUM` record opens with no report steps.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = EclFile::open(path)?;

        let seqnum_indices: Vec<usize> = file
            .get_list()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name == SEQNUM && e.arr_type == ArrType::Inte)
            .map(|(i, _)| i)
            .collect();
        file.load_data_by_index(&seqnum_indices)?;

        let mut steps = Vec::with_capacity(seqnum_indices.len());
        for (n, &start) in seqnum_indices.iter().enumerate() {
            let end = seqnum_indices.get(n + 1).copied().unwrap_or(file.len());
            let seqnum = file.get::<i32>(start)?.first().copied().ok_or_else(|| {
                EclError::Malformed {
                    path: file.path().to_path_buf(),
                    offset: file.header_offset(start).unwrap_or_default(),
                    reason: "SEQNUM array is empty".to_string(),
                }
            })?;
            steps.push(ReportStep {
                seqnum,
                arrays: start..end,
            });
        }

        debug!(target: "opm::eclio", path = %file.path().display(), steps = steps.len(), "Indexed restart file");

        Ok(Self {
            file,
            steps,
            loaded: HashSet::new(),
        })
    }

    /// Underlying record file.
    pub fn file(&self) -> &EclFile {
        &self.file
    }

    /// True when some record in the file has this name.
    pub fn has_key(&self, name: &str) -> bool {
        self.file.has_key(name)
    }

    /// Report step numbers in file order.
    pub fn list_of_report_step_numbers(&self) -> Vec<i32> {
        self.steps.iter().map(|s| s.seqnum).collect()
    }

    /// True when the file holds report step `seqnum`.
    pub fn has_report_step_number(&self, seqnum: i32) -> bool {
        self.step(seqnum).is_some()
    }

    /// Load every array of report step `seqnum`.
    pub fn load_report_step_number(&mut self, seqnum: i32) -> Result<()> {
        let range = self
            .step(seqnum)
            .ok_or(EclError::UnknownStep(seqnum))?
            .arrays
            .clone();
        let indices: Vec<usize> = range.collect();
        self.file.load_data_by_index(&indices)?;
        self.loaded.insert(seqnum);
        Ok(())
    }

    /// Name, type and size of every array in report step `seqnum`,
    /// `SEQNUM` itself included.
    ///
    /// Empty for a step not in the file.
    pub fn list_of_rst_arrays(&self, seqnum: i32) -> Vec<(String, ArrType, usize)> {
        let Some(step) = self.step(seqnum) else {
            return Vec::new();
        };
        step.arrays
            .clone()
            .filter_map(|i| self.file.entry(i).ok())
            .map(|e| (e.name, e.arr_type, e.size))
            .collect()
    }

    /// Borrow array `name` of a loaded report step.
    pub fn get_rst<T: EclElement>(&self, name: &str, seqnum: i32) -> Result<&[T]> {
        let step = self.step(seqnum).ok_or(EclError::UnknownStep(seqnum))?;
        if !self.loaded.contains(&seqnum) {
            return Err(EclError::StepNotLoaded(seqnum));
        }
        let index = step
            .arrays
            .clone()
            .find(|&i| self.file.entry(i).is_ok_and(|e| e.name == name))
            .ok_or_else(|| EclError::KeyNotFound(name.to_string()))?;
        self.file.get(index)
    }

    /// Byte offset where report step `seqnum` should be written.
    ///
    /// This is the start of the first step numbered `seqnum` or higher, so
    /// truncating there drops that step and every later one. `None` means
    /// append at the end.
    pub fn restart_step_write_position(&self, seqnum: i32) -> Option<u64> {
        self.steps
            .iter()
            .find(|s| s.seqnum >= seqnum)
            .and_then(|s| self.file.header_offset(s.arrays.start).ok())
    }

    fn step(&self, seqnum: i32) -> Option<&ReportStep> {
        self.steps.iter().find(|s| s.seqnum == seqnum)
    }
}
