//! Restart output streams
//!
//! A result set is an output directory plus a case base name. Restart
//! files are derived from it:
//!
//! ```text
//! <output_dir>/
//! ├── CASE.UNRST       # unified binary: every step, SEQNUM-delimited
//! ├── CASE.FUNRST      # unified formatted
//! ├── CASE.X0013       # per-step binary, step 13
//! └── CASE.F0013       # per-step formatted, step 13
//! ```

use std::mem;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::RestartConfig;
use crate::ecl_data::EclElement;
use crate::ecl_output::EclOutput;
use crate::erst::{ERst, SEQNUM};
use crate::error::{EclError, Result};

/// Output directory and case base name of a simulation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    /// Directory the result files are written to
    pub output_dir: PathBuf,
    /// Case name, e.g. `NORNE_ATW2013`
    pub base_name: String,
}

impl ResultSet {
    /// Create a result set.
    pub fn new(output_dir: impl AsRef<Path>, base_name: impl Into<String>) -> Self {
        ResultSet {
            output_dir: output_dir.as_ref().to_path_buf(),
            base_name: base_name.into(),
        }
    }
}

/// Path of the result file with extension `ext`.
///
/// One trailing `.` on the base name is absorbed, so `CASE` and `CASE.`
/// both give `CASE.<ext>`. Trailing separators on the directory are kept.
pub fn output_file_name(rset: &ResultSet, ext: &str) -> PathBuf {
    let stem = rset.base_name.strip_suffix('.').unwrap_or(&rset.base_name);
    rset.output_dir.join(format!("{}.{}", stem, ext))
}

/// Restart file extension: `UNRST`, `FUNRST`, `X<step>` or `F<step>`.
pub fn restart_extension(seqnum: i32, formatted: bool, unified: bool) -> String {
    match (formatted, unified) {
        (false, true) => "UNRST".to_string(),
        (true, true) => "FUNRST".to_string(),
        (formatted, false) => format!("{}{:04}", if formatted { 'F' } else { 'X' }, seqnum),
    }
}

/// Path of the restart file holding step `seqnum`.
pub fn restart_file_name(rset: &ResultSet, seqnum: i32, formatted: bool, unified: bool) -> PathBuf {
    output_file_name(rset, &restart_extension(seqnum, formatted, unified))
}

#[derive(Debug)]
struct OpenStep {
    output: EclOutput,
    seqnum: i32,
}

#[derive(Debug)]
enum StreamState {
    Unopened,
    StepOpen(OpenStep),
    Closed,
}

/// Where a [`Restart`] stream is in its life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// No step prepared yet
    Unopened,
    /// Step `seqnum` accepts arrays
    StepOpen(i32),
    /// Closed explicitly; a new step may still be prepared
    Closed,
}

/// Writer of restart steps for one result set
///
/// Each step starts with [`Restart::prepare_step`]; the arrays of that step
/// follow through [`Restart::write`] and [`Restart::message`], in on-disk
/// order. Dropping the stream flushes it.
#[derive(Debug)]
pub struct Restart {
    rset: ResultSet,
    config: RestartConfig,
    state: StreamState,
}

impl Restart {
    /// Create a stream; no file is touched until the first step.
    pub fn new(rset: ResultSet, config: RestartConfig) -> Self {
        Restart {
            rset,
            config,
            state: StreamState::Unopened,
        }
    }

    /// Result set being written.
    pub fn result_set(&self) -> &ResultSet {
        &self.rset
    }

    /// Output layout.
    pub fn config(&self) -> &RestartConfig {
        &self.config
    }

    /// Life cycle state.
    pub fn status(&self) -> StreamStatus {
        match &self.state {
            StreamState::Unopened => StreamStatus::Unopened,
            StreamState::StepOpen(step) => StreamStatus::StepOpen(step.seqnum),
            StreamState::Closed => StreamStatus::Closed,
        }
    }

    /// Step currently open, if any.
    pub fn current_step(&self) -> Option<i32> {
        match &self.state {
            StreamState::StepOpen(step) => Some(step.seqnum),
            _ => None,
        }
    }

    /// File currently open, if any.
    pub fn current_path(&self) -> Option<&Path> {
        match &self.state {
            StreamState::StepOpen(step) => Some(step.output.path()),
            _ => None,
        }
    }

    /// Open the file for report step `seqnum`.
    ///
    /// For unified output an existing file is reopened: steps numbered
    /// `seqnum` or higher are cut off and `SEQNUM` is written to start the
    /// new step. Per-step output creates or truncates the step's own file.
    pub fn prepare_step(&mut self, seqnum: i32) -> Result<()> {
        if seqnum < 0 {
            return Err(EclError::InvalidStep(seqnum));
        }
        let formatted = self.config.is_formatted();

        if let StreamState::StepOpen(current) = &mut self.state {
            if self.config.is_unified() && seqnum > current.seqnum {
                current.output.write(SEQNUM, &[seqnum])?;
                current.seqnum = seqnum;
                debug!(target: "opm::eclio", seqnum, "Appended restart step");
                return Ok(());
            }
        }

        self.close()?;

        let path = restart_file_name(&self.rset, seqnum, formatted, self.config.is_unified());
        let output = if !self.config.is_unified() {
            let output = EclOutput::create(&path, formatted)?;
            info!(target: "opm::eclio", path = %path.display(), seqnum, "Created restart file");
            output
        } else if !path.exists() {
            let mut output = EclOutput::create(&path, formatted)?;
            info!(target: "opm::eclio", path = %path.display(), "Created unified restart file");
            output.write(SEQNUM, &[seqnum])?;
            output
        } else {
            let mut output = Self::reopen_unified(&path, seqnum, formatted)?;
            output.write(SEQNUM, &[seqnum])?;
            output
        };

        debug!(target: "opm::eclio", seqnum, "Opened restart step");
        self.state = StreamState::StepOpen(OpenStep { output, seqnum });
        Ok(())
    }

    fn reopen_unified(path: &Path, seqnum: i32, formatted: bool) -> Result<EclOutput> {
        let rst = ERst::open(path)?;
        if !rst.has_key(SEQNUM) {
            return Err(EclError::NotUnifiedRestart(path.to_path_buf()));
        }

        let truncate_at = rst.restart_step_write_position(seqnum);
        if let Some(offset) = truncate_at {
            let dropped: Vec<i32> = rst
                .list_of_report_step_numbers()
                .into_iter()
                .filter(|&s| s >= seqnum)
                .collect();
            warn!(
                target: "opm::eclio",
                path = %path.display(),
                offset,
                ?dropped,
                "Truncating unified restart file"
            );
        }

        let output = EclOutput::open_existing(path, formatted, truncate_at)?;
        info!(target: "opm::eclio", path = %path.display(), seqnum, "Reopened unified restart file");
        Ok(output)
    }

    /// Write one array into the open step.
    pub fn write<T: EclElement>(&mut self, name: &str, data: &[T]) -> Result<()> {
        self.open_output()?.write(name, data)
    }

    /// Write a CHAR array from borrowed strings.
    pub fn write_strings<S: AsRef<str>>(&mut self, name: &str, data: &[S]) -> Result<()> {
        let owned: Vec<String> = data.iter().map(|s| s.as_ref().to_string()).collect();
        self.write(name, &owned)
    }

    /// Write a MESS marker into the open step.
    pub fn message(&mut self, name: &str) -> Result<()> {
        self.open_output()?.message(name)
    }

    /// Flush and close the open file.
    ///
    /// A later [`Restart::prepare_step`] opens a file again.
    pub fn close(&mut self) -> Result<()> {
        match mem::replace(&mut self.state, StreamState::Closed) {
            StreamState::StepOpen(mut current) => current.output.flush(),
            StreamState::Unopened => {
                self.state = StreamState::Unopened;
                Ok(())
            }
            StreamState::Closed => Ok(()),
        }
    }

    fn open_output(&mut self) -> Result<&mut EclOutput> {
        match &mut self.state {
            StreamState::StepOpen(current) => Ok(&mut current.output),
            _ => Err(EclError::StreamNotOpen),
        }
    }
}

impl Drop for Restart {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(target: "opm::eclio", error = %e, "Failed to flush restart file on drop");
        }
    }
}
