//! Board driver trait and error types.
//!
//! - `BoardDriver` trait - Interface for pluggable board backends
//! - `BoardError` enum - Error types for board operations
//! - `DriverFactory` type alias - Factory function type
//! - `DriverDiagnostics` struct - Driver counters

use fprog_common::config::BoardConfig;
use thiserror::Error;

use crate::board::BoardOp;

/// Error types for board operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Driver not found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Device access while the programmable device is unpowered
    #[error("Programmable device is not powered")]
    NotPowered,

    /// Address wider than the address latches
    #[error("Address {0:#X} exceeds the 20-bit device address range")]
    AddressOutOfRange(u32),
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn BoardDriver>;

/// Driver counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverDiagnostics {
    /// Op-decoder changes
    pub op_count: u64,
    /// Bytes stored into the device
    pub device_writes: u64,
    /// Bytes read out of the device
    pub device_reads: u64,
    /// Driver-specific detail
    pub custom: Option<String>,
}

/// Interface between the board layer and the hardware (or a model of it).
///
/// The board layer only calls a driver while holding the board-op token,
/// so implementations never see interleaved sequences from two cores.
///
/// # Lifecycle
///
/// 1. `init()` - Called once before any board op
/// 2. `put_op()` / `dbus_*()` / signal setters - Inside board ops
/// 3. `shutdown()` - Called when the programmer stops
pub trait BoardDriver: Send {
    /// Returns the driver's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Returns the driver's semantic version.
    fn version(&self) -> &'static str;

    /// Initialize the driver. All control lines end up inactive and the
    /// device unpowered.
    ///
    /// # Errors
    /// Return `BoardError::InitFailed` if initialization cannot complete.
    fn init(&mut self, config: &BoardConfig) -> Result<(), BoardError>;

    /// Drive `op` onto the op-decoder lines.
    fn put_op(&mut self, op: BoardOp);

    /// Switch the data bus to input and sample it.
    fn dbus_rd(&mut self) -> u8;

    /// Switch the data bus to output and drive `data`.
    fn dbus_wr(&mut self, data: u8);

    /// Programmable-device power.
    fn power(&mut self, on: bool);

    fn power_is_on(&self) -> bool;

    /// Assert (true) or release the active-low device write strobe.
    fn write_enable(&mut self, asserted: bool);

    /// Assert (true) or release the active-low device read strobe.
    fn read_enable(&mut self, asserted: bool);

    /// Graceful shutdown. Default powers the device off.
    fn shutdown(&mut self) -> Result<(), BoardError> {
        self.power(false);
        Ok(())
    }

    /// Driver counters. Default: none.
    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        None
    }
}
