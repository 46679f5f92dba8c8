//! # fprog board
//!
//! Board operations for the flash programmer: the board-op token that
//! serializes access to the shared control signals, pluggable board
//! drivers, and the programmable-device operations built on top.
//!
//! # Module Structure
//!
//! - [`board`] - Board, BoardOp, board-op token, process-wide board
//! - [`devops`] - Address latches, data strobes, power and write-enable
//! - [`driver`] - BoardDriver trait and BoardError
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Driver implementations
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌────────────────────┐
//! │ DeviceOps  │──►│ Board         │──►│ dyn BoardDriver    │
//! │ (devops)   │   │ (op token)    │   │ (simulation, ...)  │
//! └────────────┘   └───────────────┘   └────────────────────┘
//! ```

pub mod board;
pub mod devops;
pub mod driver;
pub mod driver_registry;
pub mod drivers;

pub use crate::board::{Board, BoardOp, BoardOpToken, board_handle};
pub use crate::devops::DeviceOps;
pub use crate::driver::{BoardDriver, BoardError, DriverDiagnostics, DriverFactory};
pub use crate::driver_registry::DriverRegistry;
