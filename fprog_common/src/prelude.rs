//! Prelude module for common re-exports.
//!
//! ```rust
//! use fprog_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    BoardConfig, CmtConfig, ConfigError, ConfigLoader, ProgrammerConfig, SharedConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_CONFIG_PATH, DEFAULT_TICK_US, HOUSEKEEPING_TICKS, ONE_SECOND_US};
