//! Hardware seam: clock, interrupt mask snapshot, activity indicator.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use crate::core::{CORE_COUNT, CoreId};

/// What the runtime needs from the board.
pub trait Platform: Send + Sync {
    /// Monotonic microseconds since an arbitrary epoch.
    fn now_us(&self) -> u64;

    /// Interrupt enable mask of `core`, captured for diagnostics.
    fn interrupt_status(&self, core: CoreId) -> u32 {
        let _ = core;
        0
    }

    /// Drive the activity indicator (on while a handler runs).
    fn set_activity(&self, on: bool) {
        let _ = on;
    }
}

/// Host clock based on `Instant`.
#[derive(Debug, Default)]
pub struct HostPlatform {
    epoch: OnceLock<Instant>,
}

impl HostPlatform {
    pub const fn new() -> Self {
        Self {
            epoch: OnceLock::new(),
        }
    }
}

impl Platform for HostPlatform {
    fn now_us(&self) -> u64 {
        self.epoch.get_or_init(Instant::now).elapsed().as_micros() as u64
    }
}

/// Manually advanced clock for deterministic tests and benches.
#[derive(Debug, Default)]
pub struct SimPlatform {
    now_us: AtomicU64,
    interrupt_status: [AtomicU32; CORE_COUNT],
    activity: AtomicBool,
    activity_count: AtomicU32,
}

impl SimPlatform {
    pub const fn new() -> Self {
        Self {
            now_us: AtomicU64::new(0),
            interrupt_status: [AtomicU32::new(0), AtomicU32::new(0)],
            activity: AtomicBool::new(false),
            activity_count: AtomicU32::new(0),
        }
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::SeqCst);
    }

    pub fn set_now_us(&self, us: u64) {
        self.now_us.store(us, Ordering::SeqCst);
    }

    pub fn set_interrupt_status(&self, core: CoreId, mask: u32) {
        self.interrupt_status[core.index()].store(mask, Ordering::Relaxed);
    }

    /// Whether the activity indicator is on.
    pub fn activity(&self) -> bool {
        self.activity.load(Ordering::Relaxed)
    }

    /// Times the activity indicator was switched on.
    pub fn activity_count(&self) -> u32 {
        self.activity_count.load(Ordering::Relaxed)
    }
}

impl Platform for SimPlatform {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }

    fn interrupt_status(&self, core: CoreId) -> u32 {
        self.interrupt_status[core.index()].load(Ordering::Relaxed)
    }

    fn set_activity(&self, on: bool) {
        if on {
            self.activity_count.fetch_add(1, Ordering::Relaxed);
        }
        self.activity.store(on, Ordering::Relaxed);
    }
}
