//! Board operations and the board-op token.
//!
//! A handful of board control signals are shared by multi-step bit-banged
//! sequences (latch an address byte, strobe the device). Every access goes
//! through a [`BoardOpToken`]; holding it is the only way to reach the
//! driver, so a sequence on one core can never interleave with another.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

use fprog_cmt::{CoreId, fatal};
use fprog_common::config::BoardConfig;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::driver::{BoardDriver, BoardError, DriverDiagnostics};
use crate::driver_registry::DriverRegistry;

/// Op-decoder values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BoardOp {
    #[default]
    None = 0,
    /// Address low latch load (latches on leaving the op).
    AddrLowLd,
    AddrMidLd,
    AddrHighLd,
    /// Address counter clock (counts on leaving the op).
    AddrClk,
    /// Programmable device select.
    PrgmDevSel,
    DisplayRst,
}

const NO_OWNER: u8 = u8::MAX;

/// The board: one driver behind the board-op token.
pub struct Board {
    driver: Mutex<Box<dyn BoardDriver>>,
    owner: AtomicU8,
}

impl Board {
    /// Initialize `driver` and wrap it.
    pub fn new(mut driver: Box<dyn BoardDriver>, config: &BoardConfig) -> Result<Self, BoardError> {
        driver.init(config)?;
        info!(
            driver = driver.name(),
            version = driver.version(),
            "board initialized"
        );
        Ok(Self {
            driver: Mutex::new(driver),
            owner: AtomicU8::new(NO_OWNER),
        })
    }

    /// Try to start a board op. Returns `None` if another op is in
    /// progress.
    pub fn op_start(&self) -> Option<BoardOpToken<'_>> {
        match self.driver.try_lock() {
            Some(driver) => Some(self.token(driver)),
            None => {
                debug!(owner = self.owner.load(Ordering::Relaxed), "board op already in progress");
                None
            }
        }
    }

    /// Start a board op, waiting for the one in progress to end.
    pub fn op_start_blocking(&self) -> BoardOpToken<'_> {
        let driver = self.driver.lock();
        self.token(driver)
    }

    fn token<'a>(&'a self, driver: MutexGuard<'a, Box<dyn BoardDriver>>) -> BoardOpToken<'a> {
        self.owner.store(CoreId::current() as u8, Ordering::Relaxed);
        BoardOpToken {
            board: self,
            driver,
        }
    }

    /// Core holding the token, if any.
    pub fn owner(&self) -> Option<CoreId> {
        match self.owner.load(Ordering::Relaxed) {
            0 => Some(CoreId::Core0),
            1 => Some(CoreId::Core1),
            _ => None,
        }
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver.lock().name()
    }

    pub fn diagnostics(&self) -> Option<DriverDiagnostics> {
        self.driver.lock().diagnostics()
    }

    /// Shut the driver down (device power off).
    pub fn shutdown(&self) -> Result<(), BoardError> {
        self.op_start_blocking().driver.shutdown()
    }
}

/// Exclusive access to the board control signals.
///
/// Ends with [`BoardOpToken::end`] or when dropped.
pub struct BoardOpToken<'a> {
    board: &'a Board,
    driver: MutexGuard<'a, Box<dyn BoardDriver>>,
}

impl BoardOpToken<'_> {
    /// Drive `op` onto the op-decoder lines.
    pub fn op(&mut self, op: BoardOp) {
        self.driver.put_op(op);
    }

    pub fn dbus_write(&mut self, data: u8) {
        self.driver.dbus_wr(data);
    }

    pub fn dbus_read(&mut self) -> u8 {
        self.driver.dbus_rd()
    }

    pub fn set_power(&mut self, on: bool) {
        self.driver.power(on);
    }

    pub fn power_is_on(&self) -> bool {
        self.driver.power_is_on()
    }

    pub fn set_write_enable(&mut self, asserted: bool) {
        self.driver.write_enable(asserted);
    }

    pub fn set_read_enable(&mut self, asserted: bool) {
        self.driver.read_enable(asserted);
    }

    /// End the board op.
    pub fn end(self) {}
}

impl Drop for BoardOpToken<'_> {
    fn drop(&mut self) {
        self.board.owner.store(NO_OWNER, Ordering::Relaxed);
    }
}

static BOARD: OnceLock<Board> = OnceLock::new();

/// Create the process-wide board with the driver named in `config`.
///
/// A second call halts.
pub fn init(registry: &DriverRegistry, config: &BoardConfig) -> Result<&'static Board, BoardError> {
    if BOARD.get().is_some() {
        fatal!("board init called more than once");
    }
    let driver = registry.create_driver(&config.driver)?;
    let board = Board::new(driver, config)?;
    if BOARD.set(board).is_err() {
        fatal!("board init called more than once");
    }
    Ok(board_handle())
}

/// The process-wide board. Halts if [`init`] has not run.
pub fn board_handle() -> &'static Board {
    match BOARD.get() {
        Some(board) => board,
        None => fatal!("board used before init"),
    }
}
