//! Scheduled-message behaviour through the runtime API.
//!
//! Time is advanced by calling `tick()` directly (1 tick = 1 ms).

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use fprog_cmt::schedule::SCHEDULED_MSGS_MAX;
use fprog_cmt::{Cmt, CoreId, Message, MsgId, SimPlatform, handler};
use fprog_common::config::CmtConfig;

fn new_cmt() -> Cmt {
    let clock: &'static SimPlatform = Box::leak(Box::new(SimPlatform::new()));
    Cmt::new(CmtConfig::default(), clock)
}

fn ticks(cmt: &Cmt, n: usize) {
    for _ in 0..n {
        cmt.tick();
    }
}

/// Drain `core`'s queue, skipping housekeeping, and return the kinds.
fn drain(cmt: &Cmt, core: CoreId) -> Vec<MsgId> {
    std::iter::from_fn(|| cmt.get_nowait(core))
        .map(|m| m.id)
        .filter(|&id| id != MsgId::PeriodicRt)
        .collect()
}

fn noop(_: &Cmt, _: &mut Message) {}

#[test]
fn fires_at_requested_tick() {
    let cmt = new_cmt();
    cmt.schedule_in_ms(CoreId::Core1, 5, Message::new(MsgId::AppTest));
    ticks(&cmt, 4);
    assert!(drain(&cmt, CoreId::Core1).is_empty());
    ticks(&cmt, 1);
    assert_eq!(drain(&cmt, CoreId::Core1), vec![MsgId::AppTest]);
    assert_eq!(cmt.scheduled_msgs_waiting().total, 0);
}

#[test]
fn identical_delays_fire_in_one_tick_in_insertion_order() {
    let cmt = new_cmt();
    let ids = [MsgId::AppTest, MsgId::HwrtTest, MsgId::RotaryChg, MsgId::DisplayMessage];
    for id in ids {
        cmt.schedule_in_ms(CoreId::Core0, 7, Message::new(id));
    }
    ticks(&cmt, 6);
    assert!(drain(&cmt, CoreId::Core0).is_empty());
    ticks(&cmt, 1);
    assert_eq!(drain(&cmt, CoreId::Core0), ids.to_vec());
}

#[test]
fn fire_order_follows_absolute_time() {
    let cmt = new_cmt();
    cmt.schedule_in_ms(CoreId::Core0, 30, Message::new(MsgId::AppTest));
    cmt.schedule_in_ms(CoreId::Core0, 10, Message::new(MsgId::HwrtTest));
    cmt.schedule_in_ms(CoreId::Core0, 20, Message::new(MsgId::RotaryChg));
    ticks(&cmt, 30);
    assert_eq!(
        drain(&cmt, CoreId::Core0),
        vec![MsgId::HwrtTest, MsgId::RotaryChg, MsgId::AppTest]
    );
}

#[test]
fn cancelling_earlier_entry_keeps_later_fire_time() {
    let cmt = new_cmt();
    cmt.schedule_in_ms(CoreId::Core0, 100, Message::new(MsgId::AppTest));
    cmt.schedule_in_ms(CoreId::Core0, 50, Message::new(MsgId::HwrtTest));
    assert_eq!(cmt.cancel(MsgId::HwrtTest, None, CoreId::Core0), 50);

    ticks(&cmt, 99);
    assert!(drain(&cmt, CoreId::Core0).is_empty());
    ticks(&cmt, 1);
    assert_eq!(drain(&cmt, CoreId::Core0), vec![MsgId::AppTest]);
}

#[test]
fn cancel_after_firing_is_noop() {
    let cmt = new_cmt();
    cmt.schedule_in_ms(CoreId::Core0, 2, Message::new(MsgId::AppTest));
    ticks(&cmt, 2);
    assert_eq!(cmt.cancel(MsgId::AppTest, None, CoreId::Core0), 0);
    assert_eq!(drain(&cmt, CoreId::Core0), vec![MsgId::AppTest]);
}

#[test]
fn current_core_forms_use_calling_thread_core() {
    let cmt = new_cmt();
    std::thread::scope(|s| {
        s.spawn(|| {
            CoreId::Core1.bind_current();
            cmt.schedule_msg_in_ms(10, Message::exec(handler!(noop)));
            cmt.schedule_msg_in_ms(10, Message::new(MsgId::AppTest));
            assert!(cmt.exists(MsgId::Exec));
            assert!(cmt.exists2(MsgId::Exec, handler!(noop)));
            assert!(cmt.scheduled_msg_cancel2(MsgId::Exec, handler!(noop)) > 0);
            assert!(!cmt.exists(MsgId::Exec));
            assert_eq!(cmt.scheduled_msg_cancel(MsgId::AppTest), 10);
        });
    });
    // Main thread is Core0 and sees nothing.
    cmt.schedule_in_ms(CoreId::Core1, 10, Message::new(MsgId::AppTest));
    assert!(!cmt.exists(MsgId::AppTest));
    assert!(cmt.exists_on(CoreId::Core1, MsgId::AppTest, None));
}

#[test]
fn identical_handlers_stay_distinct() {
    fn first(_: &Cmt, _: &mut Message) {}
    fn second(_: &Cmt, _: &mut Message) {}
    let cmt = new_cmt();
    cmt.schedule_msg_in_ms(10, Message::exec(handler!(first)));
    assert!(!cmt.exists2(MsgId::Exec, handler!(second)));
    assert_eq!(cmt.scheduled_msg_cancel2(MsgId::Exec, handler!(second)), 0);
    assert!(cmt.exists2(MsgId::Exec, handler!(first)));
    assert_eq!(cmt.scheduled_msg_cancel2(MsgId::Exec, handler!(first)), 10);
}

#[test]
fn waiting_counts() {
    fn later(_: &Cmt, _: usize) {}
    let cmt = new_cmt();
    cmt.run_after_ms_on(CoreId::Core0, 20, later, 0);
    cmt.schedule_in_ms(CoreId::Core1, 5, Message::new(MsgId::AppTest));
    cmt.schedule_in_ms(CoreId::Core1, 6, Message::new(MsgId::AppTest));
    let counts = cmt.scheduled_msgs_waiting();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.sleeps, 1);
    assert_eq!(counts.core0, 1);
    assert_eq!(counts.core1, 2);
}

#[test]
fn run_after_ms_invokes_callback_once_with_user_data() {
    static CALLS: AtomicU32 = AtomicU32::new(0);
    static SEEN: AtomicUsize = AtomicUsize::new(0);
    fn later(_: &Cmt, user_data: usize) {
        CALLS.fetch_add(1, Ordering::SeqCst);
        SEEN.store(user_data, Ordering::SeqCst);
    }

    let cmt = new_cmt();
    cmt.run_after_ms(16, later, 0xBEEF);
    ticks(&cmt, 16);
    while cmt.dispatch_once(CoreId::Core0) {}
    ticks(&cmt, 32);
    while cmt.dispatch_once(CoreId::Core0) {}

    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(SEEN.load(Ordering::SeqCst), 0xBEEF);
}

#[test]
fn pool_exhaustion_halts_without_losing_entries() {
    let cmt = new_cmt();
    for i in 0..SCHEDULED_MSGS_MAX {
        cmt.schedule_in_ms(CoreId::Core0, 100 + i as i32, Message::new(MsgId::AppTest));
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        cmt.schedule_in_ms(CoreId::Core0, 5, Message::new(MsgId::HwrtTest));
    }));
    assert!(result.is_err());
    assert_eq!(cmt.scheduled_msgs_waiting().total, SCHEDULED_MSGS_MAX);
    assert!(!cmt.exists_on(CoreId::Core0, MsgId::HwrtTest, None));

    ticks(&cmt, 100 + SCHEDULED_MSGS_MAX);
    let fired = drain(&cmt, CoreId::Core0);
    assert_eq!(fired.len(), SCHEDULED_MSGS_MAX);
    assert!(fired.iter().all(|&id| id == MsgId::AppTest));
}
