//! Packer configuration

use thiserror::Error;

/// Default cap on container length tags read during unpack
pub const DEFAULT_MAX_SEQUENCE_LEN: usize = u32::MAX as usize;

/// Invalid packer configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A zero cap would reject every non-empty container
    #[error("max_sequence_len must be greater than zero")]
    ZeroSequenceLimit,
}

/// Options for [`MemPacker`](crate::MemPacker) whole-object operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackerConfig {
    /// Largest container length accepted on unpack
    pub max_sequence_len: usize,
    /// Fail `unpack_object` when bytes remain after the object
    pub reject_trailing_bytes: bool,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_sequence_len: DEFAULT_MAX_SEQUENCE_LEN,
            reject_trailing_bytes: true,
        }
    }
}

impl PackerConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the container length cap
    pub fn with_max_sequence_len(mut self, len: usize) -> Self {
        self.max_sequence_len = len;
        self
    }

    /// Builder: accept leftover bytes after a whole-object unpack
    pub fn with_trailing_bytes_allowed(mut self) -> Self {
        self.reject_trailing_bytes = false;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sequence_len == 0 {
            return Err(ConfigError::ZeroSequenceLimit);
        }
        Ok(())
    }
}
