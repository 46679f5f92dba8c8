//! # fprog
//!
//! Flash programmer firmware on the CMT runtime. Core0 owns the timer,
//! housekeeping and terminal input; Core1 runs the command shell that
//! drives the programmable device.
//!
//! # Module Structure
//!
//! - [`app`] - Startup helpers, loop-started handlers, `StartupError`
//! - [`shell`] - Terminal command shell and device commands
//! - [`term`] - Stdin reader feeding terminal characters to Core1

pub mod app;
pub mod shell;
pub mod term;

pub use crate::app::StartupError;
pub use crate::shell::{Shell, ShellError};
