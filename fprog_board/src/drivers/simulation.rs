//! Simulation driver.
//!
//! Models the programmer board around a parallel EEPROM/flash device:
//! three 8-bit address latches feeding a 20-bit address counter, an 8-bit
//! data bus, device power, active-low RD/WR strobes and the device select
//! decoded from the op lines. Latches load and the counter counts when the
//! op lines leave the corresponding op, like the real clock edges.

use bitflags::bitflags;
use fprog_common::config::BoardConfig;
use tracing::debug;

use crate::board::BoardOp;
use crate::driver::{BoardDriver, BoardError, DriverDiagnostics};

/// Address lines driven by the latches/counter.
pub const ADDR_MASK: u32 = 0x000F_FFFF;

/// Content of an erased device byte.
pub const ERASED: u8 = 0xFF;

bitflags! {
    /// Control-signal state of the simulated board.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Signals: u8 {
        /// Device power.
        const POWER    = 0x01;
        /// Device write strobe asserted.
        const WRITE    = 0x02;
        /// Device read strobe asserted.
        const READ     = 0x04;
        /// Device selected.
        const SELECT   = 0x08;
        /// Data bus driven by the board.
        const DBUS_OUT = 0x10;
    }
}

/// Simulation driver implementing the BoardDriver trait.
pub struct SimulationDriver {
    name: &'static str,
    version: &'static str,
    signals: Signals,
    op: BoardOp,
    /// Low, mid, high address latches.
    latches: [u8; 3],
    counter: u32,
    dbus: u8,
    device: Vec<u8>,
    diag: DriverDiagnostics,
}

impl SimulationDriver {
    /// Create a new simulation driver instance.
    pub fn new() -> Self {
        Self {
            name: "simulation",
            version: env!("CARGO_PKG_VERSION"),
            signals: Signals::empty(),
            op: BoardOp::None,
            latches: [0; 3],
            counter: 0,
            dbus: 0,
            device: Vec::new(),
            diag: DriverDiagnostics::default(),
        }
    }

    /// Address currently presented to the device.
    pub fn address(&self) -> u32 {
        self.counter
    }

    pub fn signals(&self) -> Signals {
        self.signals
    }

    /// Device content.
    pub fn device(&self) -> &[u8] {
        &self.device
    }

    fn device_index(&self) -> Option<usize> {
        if self.device.is_empty() {
            return None;
        }
        Some(self.counter as usize & (self.device.len() - 1))
    }

    fn load_latch(&mut self, latch: usize) {
        self.latches[latch] = self.dbus;
        let [low, mid, high] = self.latches;
        self.counter = (u32::from(high & 0x0F) << 16) | (u32::from(mid) << 8) | u32::from(low);
    }

    fn select(&mut self) {
        self.signals.insert(Signals::SELECT);
        if !self.signals.contains(Signals::POWER) {
            return;
        }
        let Some(idx) = self.device_index() else {
            return;
        };
        if self.signals.contains(Signals::WRITE | Signals::DBUS_OUT) {
            self.device[idx] = self.dbus;
            self.diag.device_writes += 1;
        } else if self.signals.contains(Signals::READ) {
            self.dbus = self.device[idx];
            self.diag.device_reads += 1;
        }
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn init(&mut self, config: &BoardConfig) -> Result<(), BoardError> {
        if !config.device_size.is_power_of_two() {
            return Err(BoardError::InitFailed(format!(
                "device size {} is not a power of two",
                config.device_size
            )));
        }
        *self = Self::new();
        self.device = vec![ERASED; config.device_size as usize];
        debug!(device_size = config.device_size, "simulated device erased");
        Ok(())
    }

    fn put_op(&mut self, op: BoardOp) {
        self.diag.op_count += 1;
        if op == self.op {
            return;
        }
        match self.op {
            BoardOp::AddrLowLd => self.load_latch(0),
            BoardOp::AddrMidLd => self.load_latch(1),
            BoardOp::AddrHighLd => self.load_latch(2),
            BoardOp::AddrClk => self.counter = (self.counter + 1) & ADDR_MASK,
            BoardOp::PrgmDevSel => self.signals.remove(Signals::SELECT),
            BoardOp::None | BoardOp::DisplayRst => {}
        }
        self.op = op;
        if op == BoardOp::PrgmDevSel {
            self.select();
        }
    }

    fn dbus_rd(&mut self) -> u8 {
        self.signals.remove(Signals::DBUS_OUT);
        if self.signals.contains(Signals::POWER) {
            self.dbus
        } else {
            // Pull-downs
            0
        }
    }

    fn dbus_wr(&mut self, data: u8) {
        self.signals.insert(Signals::DBUS_OUT);
        self.dbus = data;
    }

    fn power(&mut self, on: bool) {
        self.signals.set(Signals::POWER, on);
        if !on {
            self.signals.remove(Signals::WRITE | Signals::READ);
            self.dbus = 0;
        }
    }

    fn power_is_on(&self) -> bool {
        self.signals.contains(Signals::POWER)
    }

    fn write_enable(&mut self, asserted: bool) {
        self.signals.set(Signals::WRITE, asserted);
    }

    fn read_enable(&mut self, asserted: bool) {
        self.signals.set(Signals::READ, asserted);
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        Some(DriverDiagnostics {
            custom: Some(format!(
                "addr={:05X} signals={:?}",
                self.counter, self.signals
            )),
            ..self.diag.clone()
        })
    }
}

/// Factory function for the driver registry.
pub fn create_driver() -> Box<dyn BoardDriver> {
    Box::new(SimulationDriver::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> SimulationDriver {
        let mut d = SimulationDriver::new();
        d.init(&BoardConfig {
            device_size: 0x1000,
            ..BoardConfig::default()
        })
        .unwrap();
        d
    }

    fn latch(d: &mut SimulationDriver, op: BoardOp, value: u8) {
        d.put_op(op);
        d.dbus_wr(value);
        d.put_op(BoardOp::None);
    }

    #[test]
    fn latches_form_20_bit_address() {
        let mut d = driver();
        latch(&mut d, BoardOp::AddrHighLd, 0xF5);
        latch(&mut d, BoardOp::AddrMidLd, 0x43);
        latch(&mut d, BoardOp::AddrLowLd, 0x21);
        assert_eq!(d.address(), 0x54321);
    }

    #[test]
    fn clock_counts_and_wraps() {
        let mut d = driver();
        latch(&mut d, BoardOp::AddrHighLd, 0x0F);
        latch(&mut d, BoardOp::AddrMidLd, 0xFF);
        latch(&mut d, BoardOp::AddrLowLd, 0xFE);
        d.put_op(BoardOp::AddrClk);
        assert_eq!(d.address(), 0xFFFFE);
        d.put_op(BoardOp::None);
        assert_eq!(d.address(), 0xFFFFF);
        d.put_op(BoardOp::AddrClk);
        d.put_op(BoardOp::None);
        assert_eq!(d.address(), 0);
    }

    #[test]
    fn write_needs_power_and_strobe() {
        let mut d = driver();
        d.dbus_wr(0x3C);
        d.write_enable(true);
        d.put_op(BoardOp::PrgmDevSel);
        d.put_op(BoardOp::None);
        assert_eq!(d.device()[0], ERASED);

        d.power(true);
        d.write_enable(false);
        d.dbus_wr(0x3C);
        d.put_op(BoardOp::PrgmDevSel);
        d.put_op(BoardOp::None);
        assert_eq!(d.device()[0], ERASED);

        d.write_enable(true);
        d.put_op(BoardOp::PrgmDevSel);
        assert!(d.signals().contains(Signals::SELECT));
        d.put_op(BoardOp::None);
        assert!(!d.signals().contains(Signals::SELECT));
        assert_eq!(d.device()[0], 0x3C);
    }

    #[test]
    fn read_puts_device_byte_on_bus() {
        let mut d = driver();
        d.power(true);
        d.dbus_wr(0xA7);
        d.write_enable(true);
        d.put_op(BoardOp::PrgmDevSel);
        d.put_op(BoardOp::None);
        d.write_enable(false);

        d.dbus_wr(0x00);
        d.read_enable(true);
        d.put_op(BoardOp::PrgmDevSel);
        d.put_op(BoardOp::None);
        assert_eq!(d.dbus_rd(), 0xA7);
        let diag = d.diagnostics().unwrap();
        assert_eq!((diag.device_writes, diag.device_reads), (1, 1));
    }

    #[test]
    fn unpowered_bus_reads_low() {
        let mut d = driver();
        d.dbus_wr(0x55);
        assert_eq!(d.dbus_rd(), 0);
        assert!(!d.power_is_on());
    }

    #[test]
    fn init_rejects_odd_device_size() {
        let mut d = SimulationDriver::new();
        let result = d.init(&BoardConfig {
            device_size: 3000,
            ..BoardConfig::default()
        });
        assert!(matches!(result, Err(BoardError::InitFailed(_))));
    }
}
