//! Programmable-device operations.
//!
//! Low-level steps on the device being programmed: load the address
//! latches, advance the address counter, strobe a byte in or out and
//! control the device's power and write-enable signals. Every step runs
//! inside one board-op token.

use std::thread;
use std::time::Duration;

use fprog_common::config::BoardConfig;
use tracing::{debug, trace};

use crate::board::{Board, BoardOp, BoardOpToken};
use crate::driver::BoardError;

/// Highest address the three latches can hold.
pub const ADDR_MAX: u32 = 0x000F_FFFF;

/// Device operations over a board.
pub struct DeviceOps<'a> {
    board: &'a Board,
    settle: Duration,
}

impl<'a> DeviceOps<'a> {
    /// Bind to `board` and leave the device unpowered.
    pub fn new(board: &'a Board, config: &BoardConfig) -> Self {
        let ops = Self {
            board,
            settle: Duration::from_micros(u64::from(config.settle_us)),
        };
        ops.pwr_on(false);
        ops
    }

    pub fn board(&self) -> &'a Board {
        self.board
    }

    fn settle(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }

    /// Present `value` on the bus and pulse the latch-load `op`.
    fn load_latch(&self, tkn: &mut BoardOpToken<'_>, op: BoardOp, value: u8) {
        tkn.dbus_write(value);
        self.settle();
        tkn.op(op);
        self.settle();
        tkn.op(BoardOp::None);
    }

    /// Load `addr` into the address latches/counters.
    ///
    /// # Errors
    /// `BoardError::AddressOutOfRange` if `addr` is wider than 20 bits.
    pub fn addr_set(&self, addr: u32) -> Result<(), BoardError> {
        if addr > ADDR_MAX {
            return Err(BoardError::AddressOutOfRange(addr));
        }
        let [low, mid, high, _] = addr.to_le_bytes();
        let mut tkn = self.board.op_start_blocking();
        self.load_latch(&mut tkn, BoardOp::AddrLowLd, low);
        self.load_latch(&mut tkn, BoardOp::AddrMidLd, mid);
        self.load_latch(&mut tkn, BoardOp::AddrHighLd, high & 0x0F);
        tkn.end();
        trace!("address set to {addr:05X}");
        Ok(())
    }

    /// Advance the address counter by one.
    pub fn addr_inc(&self) {
        let mut tkn = self.board.op_start_blocking();
        tkn.op(BoardOp::AddrClk);
        self.settle();
        // Counter advances on the rising clock edge.
        tkn.op(BoardOp::None);
    }

    /// Read the byte at the current address.
    ///
    /// # Errors
    /// `BoardError::NotPowered` if the device is off.
    pub fn data_get(&self) -> Result<u8, BoardError> {
        let mut tkn = self.board.op_start_blocking();
        if !tkn.power_is_on() {
            return Err(BoardError::NotPowered);
        }
        tkn.set_write_enable(false);
        tkn.set_read_enable(true);
        tkn.op(BoardOp::PrgmDevSel);
        self.settle();
        let data = tkn.dbus_read();
        tkn.op(BoardOp::None);
        tkn.set_read_enable(false);
        Ok(data)
    }

    /// Strobe `data` into the device at the current address.
    ///
    /// The device only stores the byte while write-enable is asserted
    /// (see [`wr_en`](Self::wr_en)).
    ///
    /// # Errors
    /// `BoardError::NotPowered` if the device is off.
    pub fn data_set(&self, data: u8) -> Result<(), BoardError> {
        let mut tkn = self.board.op_start_blocking();
        if !tkn.power_is_on() {
            return Err(BoardError::NotPowered);
        }
        tkn.dbus_write(data);
        self.settle();
        tkn.op(BoardOp::PrgmDevSel);
        self.settle();
        tkn.op(BoardOp::None);
        Ok(())
    }

    pub fn pwr_on(&self, on: bool) {
        let mut tkn = self.board.op_start_blocking();
        tkn.set_power(on);
        debug!(on, "device power");
    }

    pub fn pwr_is_on(&self) -> bool {
        self.board.op_start_blocking().power_is_on()
    }

    /// Assert or release the device write-enable. RD is released before
    /// WR is asserted.
    pub fn wr_en(&self, enable: bool) {
        let mut tkn = self.board.op_start_blocking();
        if enable {
            tkn.set_read_enable(false);
        }
        tkn.set_write_enable(enable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::SimulationDriver;

    fn board() -> Board {
        let config = BoardConfig {
            device_size: 0x10_0000,
            ..BoardConfig::default()
        };
        Board::new(Box::new(SimulationDriver::new()), &config).unwrap()
    }

    #[test]
    fn starts_unpowered() {
        let board = board();
        let ops = DeviceOps::new(&board, &BoardConfig::default());
        assert!(!ops.pwr_is_on());
        assert_eq!(ops.data_get(), Err(BoardError::NotPowered));
        assert_eq!(ops.data_set(0), Err(BoardError::NotPowered));
    }

    #[test]
    fn address_range_checked() {
        let board = board();
        let ops = DeviceOps::new(&board, &BoardConfig::default());
        assert!(ops.addr_set(ADDR_MAX).is_ok());
        assert_eq!(
            ops.addr_set(ADDR_MAX + 1),
            Err(BoardError::AddressOutOfRange(ADDR_MAX + 1))
        );
    }

    #[test]
    fn write_then_read_back() {
        let board = board();
        let ops = DeviceOps::new(&board, &BoardConfig::default());
        ops.pwr_on(true);
        ops.addr_set(0x12345).unwrap();
        ops.wr_en(true);
        ops.data_set(0x5A).unwrap();
        ops.wr_en(false);

        ops.addr_set(0x12344).unwrap();
        assert_eq!(ops.data_get().unwrap(), 0xFF);
        ops.addr_inc();
        assert_eq!(ops.data_get().unwrap(), 0x5A);
    }

    #[test]
    fn data_set_without_write_enable_is_ignored() {
        let board = board();
        let ops = DeviceOps::new(&board, &BoardConfig::default());
        ops.pwr_on(true);
        ops.addr_set(0x10).unwrap();
        ops.data_set(0x00).unwrap();
        assert_eq!(ops.data_get().unwrap(), 0xFF);
    }
}
