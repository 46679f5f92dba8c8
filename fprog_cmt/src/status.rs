//! Per-core process statistics over one-second windows.
//!
//! The live accumulator is updated for every dispatched message. The
//! dispatch loop itself rolls it into the frozen per-second copy on the
//! first iteration after a window elapses, so no extra timer is needed.

use fprog_common::consts::ONE_SECOND_US;

use crate::message::MsgId;

/// Statistics for one core over one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcStatusAccum {
    /// Window start [µs].
    pub ts_psa: u64,
    /// Time spent in handlers [µs].
    pub t_active: u64,
    /// Messages taken from the queue.
    pub retrieved: u32,
    /// Interrupt enable mask captured when the window closed.
    pub interrupt_status: u32,
    /// Kind of the slowest message.
    pub msg_longest: MsgId,
    /// Time of the slowest message [µs].
    pub t_msg_longest: u64,
}

impl ProcStatusAccum {
    pub const fn new(ts_psa: u64) -> Self {
        Self {
            ts_psa,
            t_active: 0,
            retrieved: 0,
            interrupt_status: 0,
            msg_longest: MsgId::Noop,
            t_msg_longest: 0,
        }
    }

    /// Record a dispatched message that took `t_msg` µs.
    #[inline]
    pub fn record(&mut self, id: MsgId, t_msg: u64) {
        self.t_active += t_msg;
        if t_msg > self.t_msg_longest {
            self.t_msg_longest = t_msg;
            self.msg_longest = id;
        }
    }

    /// Share of the window spent in handlers, in percent.
    pub fn busy_percent(&self) -> u32 {
        ((self.t_active * 100) / ONE_SECOND_US).min(100) as u32
    }
}

/// Live and per-second accumulators for one core.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreStatus {
    pub live: ProcStatusAccum,
    pub per_sec: ProcStatusAccum,
    /// Message being (or last) dispatched.
    pub curlast: MsgId,
}

impl CoreStatus {
    /// Start a fresh window at `now`.
    pub fn start(&mut self, now: u64) {
        self.live = ProcStatusAccum::new(now);
    }

    /// Freeze the live window into `per_sec` if a second has passed since
    /// it started. Returns `true` when the window rolled.
    pub fn roll_if_due(&mut self, now: u64, interrupt_status: u32) -> bool {
        if now.saturating_sub(self.live.ts_psa) < ONE_SECOND_US {
            return false;
        }
        self.per_sec = ProcStatusAccum {
            interrupt_status,
            ..self.live
        };
        self.live = ProcStatusAccum::new(now);
        true
    }
}
