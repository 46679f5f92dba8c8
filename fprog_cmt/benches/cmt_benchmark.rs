//! CMT hot-path benchmarks.
//!
//! Delta-queue insertion into a nearly full list, a tick that fires a batch,
//! and post + dispatch of one message through two registered handlers.

use criterion::{Criterion, criterion_group, criterion_main};
use fprog_cmt::schedule::{FiredBatch, SCHEDULED_MSGS_MAX, ScheduledList};
use fprog_cmt::{Affinity, Cmt, CoreId, Message, MsgId, SimPlatform, handler};
use fprog_common::config::CmtConfig;
use std::hint::black_box;

static CLOCK: SimPlatform = SimPlatform::new();

fn noop(_: &Cmt, msg: &mut Message) {
    black_box(msg);
}

fn bench_schedule_insert(c: &mut Criterion) {
    let mut list = ScheduledList::new();
    for i in 0..SCHEDULED_MSGS_MAX - 1 {
        list.insert(CoreId::Core0, (i as i32 + 1) * 10, Message::new(MsgId::AppTest));
    }

    c.bench_function("schedule_insert_cancel_31_deep", |b| {
        b.iter(|| {
            list.insert(CoreId::Core1, black_box(305), Message::new(MsgId::HwrtTest));
            black_box(list.cancel(MsgId::HwrtTest, None, CoreId::Core1));
        });
    });
}

fn bench_tick_fires_batch(c: &mut Criterion) {
    c.bench_function("tick_fire_8_ties", |b| {
        b.iter(|| {
            let mut list = ScheduledList::new();
            for _ in 0..8 {
                list.insert(CoreId::Core0, 1, Message::new(MsgId::AppTest));
            }
            let mut fired = FiredBatch::new();
            list.tick(&mut fired);
            black_box(fired.len());
        });
    });
}

fn bench_post_dispatch(c: &mut Criterion) {
    let cmt = Cmt::new(CmtConfig::default(), &CLOCK);
    cmt.add_handler_for(MsgId::AppTest, handler!(noop), Affinity::Both);
    cmt.add_handler_for(MsgId::AppTest, handler!(noop), Affinity::Core(CoreId::Core0));

    c.bench_function("post_dispatch_2_handlers", |b| {
        b.iter(|| {
            cmt.post(CoreId::Core0, Message::new(MsgId::AppTest));
            black_box(cmt.dispatch_once(CoreId::Core0));
        });
    });
}

criterion_group!(
    benches,
    bench_schedule_insert,
    bench_tick_fires_batch,
    bench_post_dispatch
);
criterion_main!(benches);
