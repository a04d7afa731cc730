//! Restart output configuration.

/// Formatted (text) vs. binary output flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Formatted(pub bool);

/// Unified (one file for all steps) vs. per-step output flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unified(pub bool);

impl Default for Unified {
    fn default() -> Self {
        Unified(true)
    }
}

/// How restart steps are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestartConfig {
    /// Text or binary records (default: binary).
    pub formatted: Formatted,

    /// One file for all steps or one file per step (default: unified).
    pub unified: Unified,
}

impl RestartConfig {
    /// Create a configuration from both flags.
    pub fn new(formatted: Formatted, unified: Unified) -> Self {
        RestartConfig { formatted, unified }
    }

    /// `CASE.UNRST`
    pub fn unified_binary() -> Self {
        Self::new(Formatted(false), Unified(true))
    }

    /// `CASE.FUNRST`
    pub fn unified_formatted() -> Self {
        Self::new(Formatted(true), Unified(true))
    }

    /// `CASE.X0001`, `CASE.X0002`, ...
    pub fn separate_binary() -> Self {
        Self::new(Formatted(false), Unified(false))
    }

    /// `CASE.F0001`, `CASE.F0002`, ...
    pub fn separate_formatted() -> Self {
        Self::new(Formatted(true), Unified(false))
    }

    /// Set the formatted flag (builder pattern).
    pub fn with_formatted(mut self, formatted: bool) -> Self {
        self.formatted = Formatted(formatted);
        self
    }

    /// Set the unified flag (builder pattern).
    pub fn with_unified(mut self, unified: bool) -> Self {
        self.unified = Unified(unified);
        self
    }

    /// True for text output.
    pub fn is_formatted(&self) -> bool {
        self.formatted.0
    }

    /// True for a single file holding every step.
    pub fn is_unified(&self) -> bool {
        self.unified.0
    }
}
