//! Device read/write commands.
//!
//! `addr`, `rd` and `wr` accept `R` to repeat their operation every
//! [`REPEAT_MS`] (for probing the board with a scope). The repeat is a
//! scheduled `Exec` message whose forced handler performs one step and
//! schedules the next; any other command cancels it. Each repeat message
//! carries the generation of the chain it belongs to, so a step already
//! posted when the chain was restarted is dropped.

use std::io::Write;

use fprog_board::DeviceOps;
use fprog_board::devops::ADDR_MAX;
use fprog_cmt::{Cmt, Handler, Message, MsgData, MsgId, handler};
use tracing::{debug, warn};

use super::{Command, Shell, ShellError, with_shell};

/// Repeat period [ms].
pub const REPEAT_MS: i32 = 10;

/// Forced handler of the repeat `Exec` message.
pub const REPEAT_HANDLER: Handler = handler!(repeat_handler);

pub const ADDR: Command = Command::new(
    "addr",
    4,
    "[addr(hex)|R]",
    "Show the address being used and optionally set it. R repeats setting it.",
    exec_addr,
);
pub const NADDR: Command = Command::new("naddr", 2, "", "Advance the address.", exec_naddr);
pub const PWR: Command = Command::new("pwr", 2, "[ON|OFF]", "Turn device power ON/OFF.", exec_pwr);
pub const RD: Command = Command::new(
    "rd",
    2,
    "[addr(hex)|R]",
    "Read device data at the current or given address. R repeats the read.",
    exec_rd,
);
pub const NRD: Command = Command::new("nrd", 2, "", "Advance the address and read device data.", exec_nrd);
pub const WR: Command = Command::new(
    "wr",
    2,
    "{[addr(hex)] data(hex)}|R",
    "Write device data at the current or given address. R repeats the write.",
    exec_wr,
);
pub const NWR: Command = Command::new(
    "nwr",
    2,
    "data(hex)",
    "Advance the address and write device data.",
    exec_nwr,
);

/// Operation a repeat performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatOp {
    AddrSet,
    WrData,
    RdData,
}

/// Device command state.
pub struct DevRdWr {
    ops: &'static DeviceOps<'static>,
    addr: u32,
    data: u8,
    repeat: Option<RepeatOp>,
    /// A repeat step is scheduled.
    delay_pending: bool,
    /// Current repeat chain.
    generation: u32,
}

impl DevRdWr {
    pub fn new(ops: &'static DeviceOps<'static>) -> Self {
        Self {
            ops,
            addr: 0,
            data: 0,
            repeat: None,
            delay_pending: false,
            generation: 0,
        }
    }

    pub fn addr(&self) -> u32 {
        self.addr
    }

    /// Last byte written or read.
    pub fn data(&self) -> u8 {
        self.data
    }

    pub fn repeat(&self) -> Option<RepeatOp> {
        self.repeat
    }

    fn set_addr(&mut self, addr: u32) -> Result<(), ShellError> {
        self.ops.addr_set(addr)?;
        self.addr = addr;
        Ok(())
    }

    fn next_addr(&mut self) -> Result<(), ShellError> {
        self.set_addr((self.addr + 1) & ADDR_MAX)
    }

    fn read(&mut self) -> Result<u8, ShellError> {
        self.data = self.ops.data_get()?;
        Ok(self.data)
    }

    fn write(&mut self) -> Result<(), ShellError> {
        self.ops.wr_en(true);
        let stored = self.ops.data_set(self.data);
        self.ops.wr_en(false);
        Ok(stored?)
    }

    /// Cancel a repeating operation, if any.
    pub fn stop_repeat(&mut self, cmt: &Cmt) {
        if let Some(op) = self.repeat.take() {
            debug!(?op, "repeat stopped");
        }
        self.generation = self.generation.wrapping_add(1);
        if self.delay_pending {
            cmt.scheduled_msg_cancel2(MsgId::Exec, REPEAT_HANDLER);
            self.delay_pending = false;
        }
    }

    fn start_repeat(&mut self, cmt: &Cmt, op: RepeatOp) {
        debug!(?op, "repeat started");
        self.repeat = Some(op);
        self.generation = self.generation.wrapping_add(1);
        self.repeat_step(cmt, self.generation);
    }

    /// Perform one step of repeat chain `generation` and schedule the next.
    /// Steps of an older chain do nothing.
    pub fn repeat_step(&mut self, cmt: &Cmt, generation: u32) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "stale repeat step dropped");
            return;
        }
        self.delay_pending = false;
        let Some(op) = self.repeat else {
            return;
        };
        let result = match op {
            RepeatOp::AddrSet => self.set_addr(self.addr),
            RepeatOp::WrData => self.write(),
            RepeatOp::RdData => self.read().map(|_| ()),
        };
        if let Err(e) = result {
            warn!(?op, "repeat stopped: {e}");
            self.repeat = None;
            return;
        }
        let next = Message::exec(REPEAT_HANDLER).data(MsgData::Value32u(self.generation));
        cmt.schedule_msg_in_ms(REPEAT_MS, next);
        self.delay_pending = true;
    }
}

fn repeat_handler(cmt: &Cmt, msg: &mut Message) {
    let MsgData::Value32u(generation) = msg.data else {
        warn!(data = ?msg.data, "repeat step without a generation");
        return;
    };
    if with_shell(|sh| sh.dev.repeat_step(cmt, generation)).is_none() {
        debug!("repeat step without a shell");
    }
}

fn is_repeat(arg: &str) -> bool {
    arg.eq_ignore_ascii_case("r")
}

fn strip_hex(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a hex device address.
pub fn parse_addr(s: &str) -> Result<u32, ShellError> {
    match u32::from_str_radix(strip_hex(s), 16) {
        Ok(addr) if addr <= ADDR_MAX => Ok(addr),
        _ => Err(ShellError::BadAddress(s.to_string())),
    }
}

/// Parse a hex data byte.
pub fn parse_byte(s: &str) -> Result<u8, ShellError> {
    u8::from_str_radix(strip_hex(s), 16).map_err(|_| ShellError::BadData(s.to_string()))
}

/// ON/TRUE/YES/1 (any case) is true, anything else false.
pub fn parse_bool(s: &str) -> bool {
    ["on", "true", "yes", "1"]
        .iter()
        .any(|t| s.eq_ignore_ascii_case(t))
}

fn show_addr(sh: &mut Shell) -> Result<(), ShellError> {
    writeln!(sh.out, "{:06X}", sh.dev.addr)?;
    Ok(())
}

fn show_data(sh: &mut Shell) -> Result<(), ShellError> {
    writeln!(sh.out, "{:06X} {:02X}", sh.dev.addr, sh.dev.data)?;
    Ok(())
}

fn exec_addr(sh: &mut Shell, cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    match args {
        [] => show_addr(sh),
        [arg] if is_repeat(arg) => {
            show_addr(sh)?;
            sh.dev.start_repeat(cmt, RepeatOp::AddrSet);
            Ok(())
        }
        [arg] => {
            let addr = parse_addr(arg)?;
            sh.dev.set_addr(addr)?;
            show_addr(sh)
        }
        _ => Err(ADDR.usage_error()),
    }
}

fn exec_naddr(sh: &mut Shell, _cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    if !args.is_empty() {
        return Err(NADDR.usage_error());
    }
    sh.dev.next_addr()?;
    show_addr(sh)
}

fn exec_pwr(sh: &mut Shell, _cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    match args {
        [] => {}
        [arg] => sh.dev.ops.pwr_on(parse_bool(arg)),
        _ => return Err(PWR.usage_error()),
    }
    let state = if sh.dev.ops.pwr_is_on() { "ON" } else { "OFF" };
    writeln!(sh.out, "Device Power: {state}")?;
    Ok(())
}

fn exec_rd(sh: &mut Shell, cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    let repeat = match args {
        [] => false,
        [arg] if is_repeat(arg) => true,
        [arg] => {
            let addr = parse_addr(arg)?;
            sh.dev.set_addr(addr)?;
            false
        }
        _ => return Err(RD.usage_error()),
    };
    sh.dev.read()?;
    show_data(sh)?;
    if repeat {
        sh.dev.start_repeat(cmt, RepeatOp::RdData);
    }
    Ok(())
}

fn exec_nrd(sh: &mut Shell, _cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    if !args.is_empty() {
        return Err(NRD.usage_error());
    }
    sh.dev.next_addr()?;
    sh.dev.read()?;
    show_data(sh)
}

fn exec_wr(sh: &mut Shell, cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    let data_arg = match args {
        [data] => *data,
        [addr, data] => {
            let addr = parse_addr(addr)?;
            sh.dev.set_addr(addr)?;
            *data
        }
        _ => return Err(WR.usage_error()),
    };
    if is_repeat(data_arg) {
        sh.dev.start_repeat(cmt, RepeatOp::WrData);
        return Ok(());
    }
    sh.dev.data = parse_byte(data_arg)?;
    sh.dev.write()
}

fn exec_nwr(sh: &mut Shell, _cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    let [data] = args else {
        return Err(NWR.usage_error());
    };
    let data = parse_byte(data)?;
    sh.dev.next_addr()?;
    sh.dev.data = data;
    sh.dev.write()
}
