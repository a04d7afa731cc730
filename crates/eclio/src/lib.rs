//! Eclipse-style record files and restart output
//!
//! This crate provides:
//! - [`EclOutput`]: typed, named records written as big-endian binary or
//!   formatted text
//! - [`EclFile`] and [`ERst`]: readers with lazy loading and report step
//!   indexing
//! - [`Restart`]: the restart stream, unified or one file per step
//! - [`ResultSet`] and [`output_file_name`]: result file naming

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod ecl_data;
pub mod ecl_file;
pub mod ecl_output;
pub mod erst;
pub mod error;
pub mod output_stream;

pub use config::{Formatted, RestartConfig, Unified};
pub use ecl_data::{ArrType, ArrayData, EclElement};
pub use ecl_file::{is_formatted_path, EclEntry, EclFile};
pub use ecl_output::EclOutput;
pub use erst::{ERst, SEQNUM};
pub use error::{EclError, Result};
pub use output_stream::{output_file_name, restart_extension, restart_file_name, Restart, ResultSet, StreamStatus};
