//! Flash Programmer Common Library
//!
//! Shared constants and configuration loading for all `fprog_*` crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading trait, shared and per-subsystem sections
//! - [`consts`] - System-wide numeric limits and defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use fprog_common::config::{ConfigLoader, ProgrammerConfig};
//! use fprog_common::consts::DEFAULT_TICK_US;
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
