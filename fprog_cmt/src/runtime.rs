//! The CMT runtime context.
//!
//! [`Cmt`] owns every table the two message loops share: the per-core
//! queues, the scheduled-message delta queue, the handler registry and the
//! per-core statistics. One instance is created at startup (see
//! [`crate::init`]); tests build independent instances with [`Cmt::new`].
//!
//! ## Locking
//! - Scheduled list: one short lock, taken by the ticker and by the
//!   schedule/cancel/exists calls. Fired messages are posted after it is
//!   released.
//! - Registry: one lock around add/remove/verify and the per-dispatch
//!   snapshot. Handlers run with no lock held.
//! - Queues: see [`CoreQueue`].

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fprog_common::config::CmtConfig;
use fprog_common::consts::HOUSEKEEPING_TICKS;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::{Affinity, CORE_COUNT, CoreId};
use crate::{fatal, handler};
use crate::message::{Handler, Message, MsgData, MsgId, SleepData, SleepFn};
use crate::platform::Platform;
use crate::queue::CoreQueue;
use crate::registry::HandlerRegistry;
use crate::rt;
use crate::schedule::{FiredBatch, ScheduledCounts, ScheduledList};
use crate::status::{CoreStatus, ProcStatusAccum};

/// `SCHED_FIFO` priority of the ticker thread (`rt` feature).
pub const TICKER_RT_PRIORITY: i32 = 80;

/// Forced handler of `run_after_ms` messages.
pub const SLEEP_HANDLER: Handler = handler!(handle_sleep);

const HOUSEKEEP_HANDLERS: [Handler; CORE_COUNT] =
    [handler!(housekeep0), handler!(housekeep1)];

/// Runtime context shared by both cores and the ticker.
pub struct Cmt {
    config: CmtConfig,
    platform: &'static dyn Platform,
    queues: [CoreQueue; CORE_COUNT],
    scheduled: Mutex<ScheduledList>,
    registry: Mutex<HandlerRegistry>,
    status: [Mutex<CoreStatus>; CORE_COUNT],
    housekeep_rt: AtomicU8,
    hk_count: AtomicU32,
    hk_verifies: AtomicU32,
    hk_pending: [AtomicBool; CORE_COUNT],
    loop_running: [AtomicBool; CORE_COUNT],
    post_errors: [AtomicU32; CORE_COUNT],
    msg_seq: AtomicU32,
    ticker_started: AtomicBool,
}

impl Cmt {
    /// Build a runtime with empty queues, lists and pools.
    pub fn new(config: CmtConfig, platform: &'static dyn Platform) -> Self {
        let now = platform.now_us();
        let status = CoreStatus {
            live: ProcStatusAccum::new(now),
            ..CoreStatus::default()
        };
        Self {
            config,
            platform,
            queues: [CoreQueue::new(CoreId::Core0), CoreQueue::new(CoreId::Core1)],
            scheduled: Mutex::new(ScheduledList::new()),
            registry: Mutex::new(HandlerRegistry::new()),
            status: [Mutex::new(status), Mutex::new(status)],
            housekeep_rt: AtomicU8::new(0),
            hk_count: AtomicU32::new(0),
            hk_verifies: AtomicU32::new(0),
            hk_pending: [AtomicBool::new(false), AtomicBool::new(false)],
            loop_running: [AtomicBool::new(false), AtomicBool::new(false)],
            post_errors: [AtomicU32::new(0), AtomicU32::new(0)],
            msg_seq: AtomicU32::new(0),
            ticker_started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CmtConfig {
        &self.config
    }

    pub fn platform(&self) -> &'static dyn Platform {
        self.platform
    }

    /// Milliseconds on the platform clock (wraps like the device counter).
    pub fn now_ms(&self) -> u32 {
        (self.platform.now_us() / 1000) as u32
    }

    // ─── Posting ────────────────────────────────────────────────────

    fn stamp(&self, mut msg: Message) -> Message {
        msg.n = self.msg_seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        msg.t = self.now_ms();
        msg
    }

    /// Post a must-deliver message to `core`.
    ///
    /// A full queue halts unless `no_qadd_panic` is configured, in which
    /// case the message is dropped. Either way the core's post-error count
    /// goes up.
    pub fn post(&self, core: CoreId, msg: Message) {
        self.deliver(core, msg);
    }

    /// [`Cmt::post`], returning `false` when `no_qadd_panic` dropped `msg`.
    fn deliver(&self, core: CoreId, msg: Message) -> bool {
        let msg = self.stamp(msg);
        let queue = &self.queues[core.index()];
        if let Err(msg) = queue.try_add(msg) {
            let errors = self.post_errors[core.index()].fetch_add(1, Ordering::Relaxed) + 1;
            let curlast = self.curlast_msg(core);
            if self.config.no_qadd_panic {
                warn!(%core, id = %msg.id, errors, "queue full, message dropped");
                return false;
            }
            error!(
                %core,
                pending = ?queue.pending_ids().as_slice(),
                "queue full"
            );
            fatal!(
                "{core} msg '{}' could not post. Current/last msg: {curlast}",
                msg.id
            );
        }
        true
    }

    /// Post a discardable message. Returns `false` if `core`'s queue was
    /// full and the message was dropped.
    pub fn post_nowait(&self, core: CoreId, msg: Message) -> bool {
        let ok = self.queues[core.index()].try_add(self.stamp(msg)).is_ok();
        if !ok {
            self.post_errors[core.index()].fetch_add(1, Ordering::Relaxed);
        }
        ok
    }

    /// Post to `core`, waiting for room. Startup synchronization only.
    pub fn post_blocking(&self, core: CoreId, msg: Message) {
        self.queues[core.index()].add_blocking(self.stamp(msg));
    }

    /// Take the next message for `core`, waiting for one.
    pub fn get_blocking(&self, core: CoreId) -> Message {
        self.queues[core.index()].remove_blocking()
    }

    /// Take the next message for `core` if there is one.
    pub fn get_nowait(&self, core: CoreId) -> Option<Message> {
        self.queues[core.index()].try_remove()
    }

    /// Messages waiting in `core`'s queue.
    pub fn queued(&self, core: CoreId) -> usize {
        self.queues[core.index()].len()
    }

    // ─── Scheduling ─────────────────────────────────────────────────

    /// Post `msg` to `core` after `ms` milliseconds.
    pub fn schedule_in_ms(&self, core: CoreId, ms: i32, msg: Message) {
        self.scheduled.lock().insert(core, ms, msg);
    }

    /// Post `msg` to the calling core after `ms` milliseconds.
    pub fn schedule_msg_in_ms(&self, ms: i32, msg: Message) {
        self.schedule_in_ms(CoreId::current(), ms, msg);
    }

    /// Cancel the scheduled message for `core` with kind `id` and forced
    /// handler `hdlr`. Returns the ms it had left, 0 if none was waiting.
    pub fn cancel(&self, id: MsgId, hdlr: Option<Handler>, core: CoreId) -> i32 {
        self.scheduled.lock().cancel(id, hdlr, core)
    }

    /// Cancel a handler-less scheduled `id` for the calling core.
    pub fn scheduled_msg_cancel(&self, id: MsgId) -> i32 {
        self.cancel(id, None, CoreId::current())
    }

    /// Cancel a scheduled `id` with forced handler `hdlr` for the calling
    /// core.
    pub fn scheduled_msg_cancel2(&self, id: MsgId, hdlr: Handler) -> i32 {
        self.cancel(id, Some(hdlr), CoreId::current())
    }

    /// Whether `id` is scheduled for the calling core (any handler).
    pub fn exists(&self, id: MsgId) -> bool {
        self.exists_on(CoreId::current(), id, None)
    }

    /// Whether `id` with forced handler `hdlr` is scheduled for the calling
    /// core.
    pub fn exists2(&self, id: MsgId, hdlr: Handler) -> bool {
        self.exists_on(CoreId::current(), id, Some(hdlr))
    }

    pub fn exists_on(&self, core: CoreId, id: MsgId, hdlr: Option<Handler>) -> bool {
        self.scheduled.lock().exists(core, id, hdlr)
    }

    /// Scheduled messages waiting, by core.
    pub fn scheduled_msgs_waiting(&self) -> ScheduledCounts {
        self.scheduled.lock().counts(SLEEP_HANDLER)
    }

    /// Call `f(cmt, user_data)` on the calling core after `ms` milliseconds.
    pub fn run_after_ms(&self, ms: i32, f: SleepFn, user_data: usize) {
        self.run_after_ms_on(CoreId::current(), ms, f, user_data);
    }

    /// Call `f(cmt, user_data)` on `core` after `ms` milliseconds.
    pub fn run_after_ms_on(&self, core: CoreId, ms: i32, f: SleepFn, user_data: usize) {
        let msg = Message::with_handler(MsgId::CmtSleep, SLEEP_HANDLER).data(MsgData::Sleep(
            SleepData {
                sleep_fn: f,
                user_data,
            },
        ));
        self.schedule_in_ms(core, ms, msg);
    }

    /// Log every scheduled-message pool slot.
    pub fn log_scheduled(&self) {
        self.scheduled.lock().log_entries();
    }

    // ─── Handlers ───────────────────────────────────────────────────

    /// Register `handler` for `id` on the calling core.
    pub fn add_handler(&self, id: MsgId, handler: Handler) {
        self.add_handler_for(id, handler, CoreId::current().into());
    }

    /// Register `handler` for `id` with an explicit affinity.
    pub fn add_handler_for(&self, id: MsgId, handler: Handler, affinity: Affinity) {
        self.registry.lock().add(id, handler, affinity);
        debug!(%id, ?handler, %affinity, "handler added");
    }

    /// Unregister `handler` for `id` on the calling core.
    pub fn remove_handler(&self, id: MsgId, handler: Handler) -> bool {
        self.remove_handler_for(id, handler, CoreId::current().into())
    }

    /// Unregister the first `(handler, affinity)` registration for `id`.
    pub fn remove_handler_for(&self, id: MsgId, handler: Handler, affinity: Affinity) -> bool {
        let removed = self.registry.lock().remove(id, handler, affinity);
        debug!(%id, ?handler, %affinity, removed, "handler remove");
        removed
    }

    /// Handlers registered for `id`, any core.
    pub fn handler_count(&self, id: MsgId) -> usize {
        self.registry.lock().count(id)
    }

    /// Check the handler registry links, halting on corruption.
    pub fn verify_handlers(&self) {
        self.registry.lock().verify();
    }

    // ─── Timer tick ─────────────────────────────────────────────────

    /// One timer interrupt: age the scheduled list, post what is due, and
    /// every 16th tick post housekeeping to each core whose previous
    /// housekeeping message has been handled.
    pub fn tick(&self) {
        let mut fired = FiredBatch::new();
        self.scheduled.lock().tick(&mut fired);
        for (core, msg) in fired {
            self.post(core, msg);
        }

        let hk = self.housekeep_rt.load(Ordering::Relaxed).wrapping_add(1) % HOUSEKEEPING_TICKS;
        self.housekeep_rt.store(hk, Ordering::Relaxed);
        if hk == 0 {
            for core in CoreId::ALL {
                let pending = &self.hk_pending[core.index()];
                if !pending.swap(true, Ordering::AcqRel) {
                    let msg =
                        Message::with_handler(MsgId::PeriodicRt, HOUSEKEEP_HANDLERS[core.index()]);
                    if !self.deliver(core, msg) {
                        pending.store(false, Ordering::Release);
                    }
                }
            }
        }
    }

    /// Spawn the ticker thread calling [`Cmt::tick`] every `tick_us`.
    ///
    /// Starting it twice halts.
    pub fn start_ticker(&'static self) -> std::io::Result<JoinHandle<()>> {
        if self.ticker_started.swap(true, Ordering::SeqCst) {
            fatal!("CMT ticker started more than once");
        }
        let period = Duration::from_micros(u64::from(self.config.tick_us));
        info!(tick_us = self.config.tick_us, "starting CMT ticker");
        thread::Builder::new()
            .name("cmt-tick".into())
            .spawn(move || {
                if let Err(e) = rt::set_fifo_priority(TICKER_RT_PRIORITY) {
                    warn!("ticker runs without RT priority: {e}");
                }
                let mut next = Instant::now() + period;
                loop {
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    }
                    self.tick();
                    next += period;
                }
            })
    }

    // ─── Dispatch ───────────────────────────────────────────────────

    fn invoke(&self, handler: Handler, msg: &mut Message) {
        self.platform.set_activity(true);
        handler.call(self, msg);
        self.platform.set_activity(false);
    }

    /// One message-loop iteration for `core`.
    ///
    /// Rolls the statistics window if due, then dispatches at most one
    /// message: forced handler first, then (unless aborted) the registered
    /// handlers for the calling core, most recent first, stopping as soon
    /// as one sets `abort`. Returns `false` when the queue was empty.
    pub fn dispatch_once(&self, core: CoreId) -> bool {
        let t_start = self.platform.now_us();
        {
            let mut st = self.status[core.index()].lock();
            if st.roll_if_due(t_start, self.platform.interrupt_status(core)) {
                let sec = st.per_sec;
                drop(st);
                debug!(
                    %core,
                    retrieved = sec.retrieved,
                    t_active = sec.t_active,
                    longest = %sec.msg_longest,
                    "status window"
                );
            }
        }

        let Some(mut msg) = self.queues[core.index()].try_remove() else {
            return false;
        };
        {
            let mut st = self.status[core.index()].lock();
            st.live.retrieved += 1;
            st.curlast = msg.id;
        }

        if let Some(hdlr) = msg.hdlr {
            self.invoke(hdlr, &mut msg);
        }
        if !msg.abort {
            // Snapshot so handlers may add/remove registrations.
            let handlers = self.registry.lock().handlers_for(msg.id, core);
            for handler in handlers {
                if msg.abort {
                    break;
                }
                self.invoke(handler, &mut msg);
            }
        }

        let t_msg = self.platform.now_us().saturating_sub(t_start);
        self.status[core.index()].lock().live.record(msg.id, t_msg);
        true
    }

    /// Run `core`'s message loop on the calling thread. Never returns.
    ///
    /// `on_started` is posted to the loop as a `LoopStarted` message
    /// before the first poll.
    pub fn dispatch_forever(&self, core: CoreId, on_started: Option<Handler>) -> ! {
        core.bind_current();
        if self.loop_running[core.index()].swap(true, Ordering::SeqCst) {
            fatal!("message loop for {core} started more than once");
        }
        self.status[core.index()].lock().start(self.platform.now_us());
        info!(%core, "message loop running");

        if let Some(h) = on_started {
            self.post(core, Message::with_handler(MsgId::LoopStarted, h));
        }
        loop {
            if !self.dispatch_once(core) {
                thread::yield_now();
            }
        }
    }

    // ─── Status ─────────────────────────────────────────────────────

    /// Statistics of `core`'s last complete one-second window.
    pub fn status_snapshot(&self, core: CoreId) -> ProcStatusAccum {
        self.status[core.index()].lock().per_sec
    }

    /// Statistics of `core`'s window in progress.
    pub fn status_live(&self, core: CoreId) -> ProcStatusAccum {
        self.status[core.index()].lock().live
    }

    /// Message `core` is dispatching, or dispatched last.
    pub fn curlast_msg(&self, core: CoreId) -> MsgId {
        self.status[core.index()].lock().curlast
    }

    pub fn message_loop_running(&self, core: CoreId) -> bool {
        self.loop_running[core.index()].load(Ordering::SeqCst)
    }

    /// Whether both message loops are running.
    pub fn message_loops_running(&self) -> bool {
        CoreId::ALL.iter().all(|&c| self.message_loop_running(c))
    }

    /// Housekeeping messages handled by Core0.
    pub fn housekeeping_count(&self) -> u32 {
        self.hk_count.load(Ordering::Relaxed)
    }

    /// Registry verifications run by Core1 housekeeping.
    pub fn registry_verifications(&self) -> u32 {
        self.hk_verifies.load(Ordering::Relaxed)
    }

    /// Failed posts to `core` (full queue).
    pub fn post_errors(&self, core: CoreId) -> u32 {
        self.post_errors[core.index()].load(Ordering::Relaxed)
    }
}

fn handle_sleep(cmt: &Cmt, msg: &mut Message) {
    if let MsgData::Sleep(sleep) = msg.data {
        (sleep.sleep_fn)(cmt, sleep.user_data);
    }
}

fn housekeep0(cmt: &Cmt, _msg: &mut Message) {
    cmt.hk_pending[CoreId::Core0.index()].store(false, Ordering::Release);
    cmt.hk_count.fetch_add(1, Ordering::Relaxed);
}

fn housekeep1(cmt: &Cmt, _msg: &mut Message) {
    cmt.hk_pending[CoreId::Core1.index()].store(false, Ordering::Release);
    if cmt.housekeeping_count() % cmt.config.verify_every_hk == 0 {
        cmt.verify_handlers();
        cmt.hk_verifies.fetch_add(1, Ordering::Relaxed);
    }
}
