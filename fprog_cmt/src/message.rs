//! Message envelope: kind, payload, forced handler and post-time stamps.
//!
//! A [`Message`] is a small `Copy` value. It is built by the caller right
//! before posting, copied into a queue slot (or a scheduled entry) and
//! dispatched once.

use std::fmt;

use static_assertions::const_assert_eq;

use crate::runtime::Cmt;

/// Number of message-kind slots (handler registry heads).
pub const MSG_ID_CNT: usize = 0x100;

/// Message kind.
///
/// Grouped by producer: common `0x00-0x5F`, hardware runtime `0x60-0xBF`,
/// application `0xC0-0xFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum MsgId {
    // Common
    #[default]
    Noop = 0x00,
    LoopStarted,
    HwrtStarted,
    AppsStarted,
    /// Housekeeping broadcast, every 16 ticks.
    PeriodicRt,
    CmtSleep,
    /// General purpose kind used with a forced handler.
    Exec,
    ConfigChanged,
    DebugChanged,
    SwAction,
    SwDebounce,
    SwLongpressDelay,
    TermCharRcvd,
    // Hardware runtime
    HwrtNoop = 0x60,
    HwrtTest,
    RotaryChg,
    StdioCharReady,
    // Application
    AppNoop = 0xC0,
    AppTest,
    CmdKeyPressed,
    CmdInitTerminal,
    DisplayMessage,
    InputCharReady,
}

const_assert_eq!(MSG_ID_CNT, u8::MAX as usize + 1);

impl MsgId {
    /// Registry slot of this kind.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", *self as u8)
    }
}

/// Handler callback signature.
pub type HandlerFn = fn(&Cmt, &mut Message);

/// A message handler.
///
/// A handler's identity is its name, not its function address: optimized
/// builds may fold functions with identical bodies into one. Build each
/// handler once, usually as a `const` next to its function, with
/// [`handler!`](crate::handler) or [`Handler::new`].
#[derive(Clone, Copy)]
pub struct Handler {
    name: &'static str,
    f: HandlerFn,
}

impl Handler {
    /// Handler called `name`. Names must be unique per function.
    pub const fn new(name: &'static str, f: HandlerFn) -> Self {
        Self { name, f }
    }

    /// Invoke the handler.
    #[inline]
    pub fn call(self, cmt: &Cmt, msg: &mut Message) {
        (self.f)(cmt, msg)
    }

    pub fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({})", self.name)
    }
}

/// Build a [`Handler`] named after the function and the module naming it.
///
/// ```ignore
/// const TICK: Handler = handler!(on_tick);
/// ```
#[macro_export]
macro_rules! handler {
    ($f:ident) => {
        $crate::message::Handler::new(concat!(module_path!(), "::", stringify!($f)), $f)
    };
}

/// Deferred callback run through [`Cmt::run_after_ms`].
pub type SleepFn = fn(&Cmt, usize);

/// Payload of a `CmtSleep` message.
#[derive(Debug, Clone, Copy)]
pub struct SleepData {
    pub sleep_fn: SleepFn,
    pub user_data: usize,
}

/// Input switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchId {
    AttnCmd,
    Rotary,
}

/// A switch press/release event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchAction {
    pub switch_id: SwitchId,
    /// Long press if true.
    pub longpress: bool,
    /// Pressed, otherwise released.
    pub pressed: bool,
    /// Auto-repeat event.
    pub repeat: bool,
}

/// Message payload.
#[derive(Debug, Clone, Copy, Default)]
pub enum MsgData {
    #[default]
    None,
    Char(char),
    Bool(bool),
    Debug(bool),
    Sleep(SleepData),
    Value16(i16),
    Value16u(u16),
    Status(i32),
    Value32u(u32),
    SwAction(SwitchAction),
    Str(&'static str),
    TsMs(u32),
    TsUs(u64),
    /// Opaque pointer-sized value.
    Ptr(usize),
}

/// A CMT message.
#[derive(Debug, Clone, Copy, Default)]
pub struct Message {
    pub id: MsgId,
    /// Once set, no further handler runs for this dispatch.
    pub abort: bool,
    pub data: MsgData,
    /// Forced handler, run before any registered handler.
    pub hdlr: Option<Handler>,
    /// Sequence number, stamped at post.
    pub n: u32,
    /// Post time [ms], stamped at post.
    pub t: u32,
}

impl Message {
    /// Plain message: no forced handler, registered handlers run.
    pub const fn new(id: MsgId) -> Self {
        Self::with_ctrl(id, None, false)
    }

    /// Message whose `hdlr` runs first, followed by registered handlers.
    pub const fn with_handler(id: MsgId, hdlr: Handler) -> Self {
        Self::with_ctrl(id, Some(hdlr), false)
    }

    /// Full control. With `abort` set only the forced handler runs.
    pub const fn with_ctrl(id: MsgId, hdlr: Option<Handler>, abort: bool) -> Self {
        Self {
            id,
            abort,
            data: MsgData::None,
            hdlr,
            n: 0,
            t: 0,
        }
    }

    /// `Exec` message that runs only `hdlr`.
    pub const fn exec(hdlr: Handler) -> Self {
        Self::with_ctrl(MsgId::Exec, Some(hdlr), true)
    }

    /// Attach a payload.
    pub const fn data(mut self, data: MsgData) -> Self {
        self.data = data;
        self
    }

    /// Drop the forced handler so a re-post goes to the registered ones.
    pub fn rm_handler(&mut self) {
        self.hdlr = None;
    }

    /// Stop handling after the current handler returns.
    pub fn abort_handling(&mut self) {
        self.abort = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler;

    fn h1(_: &Cmt, _: &mut Message) {}
    fn h2(_: &Cmt, msg: &mut Message) {
        msg.abort_handling();
    }
    // Same body as h1.
    fn h1_twin(_: &Cmt, _: &mut Message) {}

    #[test]
    fn id_groups() {
        assert_eq!(MsgId::Noop.index(), 0x00);
        assert_eq!(MsgId::TermCharRcvd.index(), 0x0C);
        assert_eq!(MsgId::StdioCharReady.index(), 0x63);
        assert_eq!(MsgId::InputCharReady.index(), 0xC5);
        assert_eq!(MsgId::Exec.to_string(), "06");
    }

    #[test]
    fn handler_identity_is_name() {
        assert_eq!(handler!(h1), handler!(h1));
        assert_ne!(handler!(h1), handler!(h2));
        // Identical bodies stay distinct even if the functions are folded.
        assert_ne!(handler!(h1), handler!(h1_twin));
        assert_eq!(handler!(h1).name(), "fprog_cmt::message::tests::h1");
        assert_eq!(Handler::new("a", h1), Handler::new("a", h2));
    }

    #[test]
    fn builders() {
        let m = Message::new(MsgId::AppTest);
        assert!(!m.abort);
        assert!(m.hdlr.is_none());

        let m = Message::with_handler(MsgId::AppTest, handler!(h1));
        assert!(!m.abort);
        assert_eq!(m.hdlr, Some(handler!(h1)));

        let mut m = Message::exec(handler!(h2));
        assert_eq!(m.id, MsgId::Exec);
        assert!(m.abort);
        m.rm_handler();
        assert!(m.hdlr.is_none());
    }

    #[test]
    fn payload_builder() {
        let m = Message::new(MsgId::TermCharRcvd).data(MsgData::Char('x'));
        assert!(matches!(m.data, MsgData::Char('x')));
    }
}
