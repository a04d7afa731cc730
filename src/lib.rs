//! opm-common - simulator state serialization and restart output
//!
//! Two layers, re-exported here:
//!
//! - [`serialization`]: the in-memory pack/unpack protocol. Aggregates
//!   implement [`Field`] once and [`MemPacker`] sizes, packs, unpacks and
//!   compares them.
//! - [`eclio`]: Eclipse-style record files. [`Restart`] writes report
//!   steps; [`EclFile`] and [`ERst`] read them back.
//!
//! # Quick Start
//!
//! ```no_run
//! use opm_common::{ERst, Restart, RestartConfig, ResultSet};
//!
//! # fn main() -> opm_common::Result<()> {
//! let mut restart = Restart::new(ResultSet::new("/tmp/run", "CASE"), RestartConfig::unified_binary());
//! restart.prepare_step(1)?;
//! restart.write("PRESSURE", &[250.0f64, 251.5])?;
//! restart.close()?;
//!
//! let rst = ERst::open("/tmp/run/CASE.UNRST")?;
//! assert_eq!(rst.list_of_report_step_numbers(), vec![1]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use thiserror::Error;

pub use opm_eclio as eclio;
pub use opm_serialization as serialization;

pub use opm_eclio::{
    output_file_name, restart_extension, restart_file_name, ArrType, EclEntry, EclError, EclFile, EclOutput, ERst,
    Formatted, Restart, RestartConfig, ResultSet, StreamStatus, Unified,
};
pub use opm_serialization::{
    persisted_eq, Bitset, ConfigError, EnvelopeError, Field, MemPacker, PackError, PackerConfig, Packing,
    Serializer, TimePoint,
};

/// Result type alias for opm-common operations
pub type Result<T> = std::result::Result<T, Error>;

/// Any error raised by the member crates
#[derive(Debug, Error)]
pub enum Error {
    /// Packing or unpacking failed
    #[error(transparent)]
    Pack(#[from] PackError),

    /// Sealed buffer rejected
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Invalid packer configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Record file or restart stream failure
    #[error(transparent)]
    Ecl(#[from] EclError),
}
