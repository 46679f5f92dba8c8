//! Startup pieces shared by the binary and the integration tests.

use std::io::{self, Write};
use std::sync::OnceLock;

use fprog_board::{BoardError, DeviceOps, DriverRegistry, board};
use fprog_cmt::{Cmt, CoreId, Handler, Message, fatal, halt, handler};
use fprog_common::config::{BoardConfig, ConfigError};
use thiserror::Error;
use tracing::info;

use crate::shell;

/// CPU the Core0 thread is pinned to (`rt` feature).
pub const CORE0_CPU: usize = 0;
/// CPU the Core1 thread is pinned to (`rt` feature).
pub const CORE1_CPU: usize = 1;

/// Forced handler of Core0's `LoopStarted` message.
pub const CORE0_STARTED: Handler = handler!(on_core0_started);
/// Forced handler of Core1's `LoopStarted` message.
pub const CORE1_STARTED: Handler = handler!(on_core1_started);

/// Startup failure, reported by `main` before exiting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Board error: {0}")]
    Board(#[from] BoardError),

    #[error("Thread start failed: {0}")]
    Io(#[from] io::Error),

    #[error("Signal handler setup failed: {0}")]
    Signal(#[from] ctrlc::Error),
}

static DEVICE: OnceLock<DeviceOps<'static>> = OnceLock::new();

/// Initialize the board with the configured driver and bind the device
/// operations to it. A second call halts.
pub fn init_device(config: &BoardConfig) -> Result<&'static DeviceOps<'static>, StartupError> {
    let registry = DriverRegistry::with_builtin_drivers();
    info!("Available board drivers: {:?}", registry.list_drivers());
    let board = board::init(&registry, config)?;
    if DEVICE.set(DeviceOps::new(board, config)).is_err() {
        fatal!("device ops initialized more than once");
    }
    Ok(device_ops())
}

/// The process-wide device operations. Halts if [`init_device`] has not run.
pub fn device_ops() -> &'static DeviceOps<'static> {
    match DEVICE.get() {
        Some(ops) => ops,
        None => fatal!("device ops used before init"),
    }
}

/// Halt indicator: ring the terminal bell and flag the halt on stderr.
pub fn halt_indicator() {
    let mut err = io::stderr().lock();
    let _ = writeln!(err, "\x07*** fprog HALTED ***");
    let _ = err.flush();
}

/// Make any halt stop the whole process, whatever the panic strategy.
/// A halt on the `core1` or `cmt-tick` thread would otherwise end only
/// that thread.
pub fn install_abort_on_halt() {
    halt::install_stop_on_panic(abort_process);
}

fn abort_process() {
    std::process::abort();
}

/// `LoopStarted` handler for Core0.
pub fn on_core0_started(cmt: &Cmt, _msg: &mut Message) {
    info!(
        tick_us = cmt.config().tick_us,
        "Core0 started (timer, housekeeping, stdin)"
    );
}

/// `LoopStarted` handler for Core1: bring up the shell.
pub fn on_core1_started(cmt: &Cmt, _msg: &mut Message) {
    info!("Core1 started (shell)");
    shell::start(cmt);
    if !cmt.message_loop_running(CoreId::Core0) {
        info!("Core0 loop not running yet");
    }
}
