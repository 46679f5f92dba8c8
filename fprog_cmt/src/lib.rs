//! # fprog CMT
//!
//! Cooperative multi-tasking runtime for the two message-loop cores of the
//! flash programmer.
//!
//! Each core runs [`Cmt::dispatch_forever`]: it polls its own queue and
//! runs the handlers registered for each message kind. Handlers never
//! block; anything that has to wait is a scheduled message that comes back
//! later. A ticker thread stands in for the 1 ms timer interrupt, ages the
//! scheduled messages and broadcasts the 16 ms housekeeping message.
//!
//! # Module Structure
//!
//! - [`message`] - Message envelope, kinds, handlers
//! - [`queue`] - Per-core bounded FIFOs
//! - [`schedule`] - Delta queue of scheduled messages
//! - [`registry`] - Per-kind handler lists
//! - [`pool`] - Fixed slot pools behind the list and the registry
//! - [`status`] - Per-core one-second statistics
//! - [`runtime`] - The [`Cmt`] context tying it together
//! - [`platform`] - Clock and board seam
//! - [`halt`] - Fatal halt path
//!
//! ```text
//!   ticker ──tick()──► ScheduledList ──due──┐
//!                                           ▼
//!   handlers ──post()──────────────► CoreQueue[0|1] ──► dispatch loop ──► handlers
//!                                                              ▲
//!                                           HandlerRegistry ───┘
//! ```

pub mod core;
pub mod halt;
pub mod message;
pub mod platform;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod rt;
pub mod runtime;
pub mod schedule;
pub mod status;

use std::sync::OnceLock;

use fprog_common::config::CmtConfig;

pub use crate::core::{Affinity, CoreId};
pub use crate::message::{Handler, Message, MsgData, MsgId, SleepFn};
pub use crate::platform::{HostPlatform, Platform, SimPlatform};
pub use crate::runtime::Cmt;
pub use crate::schedule::ScheduledCounts;
pub use crate::status::ProcStatusAccum;

static CMT: OnceLock<Cmt> = OnceLock::new();

/// Create the process-wide runtime. A second call halts.
pub fn init(config: CmtConfig, platform: &'static dyn Platform) -> &'static Cmt {
    if CMT.set(Cmt::new(config, platform)).is_err() {
        fatal!("CMT init called more than once");
    }
    cmt()
}

/// The process-wide runtime. Halts if [`init`] has not run.
pub fn cmt() -> &'static Cmt {
    match CMT.get() {
        Some(cmt) => cmt,
        None => fatal!("CMT used before init"),
    }
}

/// The process-wide runtime, if initialized.
pub fn try_cmt() -> Option<&'static Cmt> {
    CMT.get()
}
