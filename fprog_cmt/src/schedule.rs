//! Scheduled messages: a delta queue over a fixed pool.
//!
//! Entries are kept in firing order. Each entry's `remaining` is relative
//! to the entry before it, so the sum of `remaining` from the head through
//! any entry is that entry's absolute time to fire. A tick only decrements
//! the head; when it reaches zero the head fires together with every
//! following entry whose delta is zero.

use heapless::Vec;

use crate::core::CoreId;
use crate::fatal;
use crate::message::{Handler, Message, MsgId};
use crate::pool::{Pool, SlotId};

/// Scheduled messages outstanding at once.
pub const SCHEDULED_MSGS_MAX: usize = 32;

/// Messages fired by one tick, in firing order.
pub type FiredBatch = Vec<(CoreId, Message), SCHEDULED_MSGS_MAX>;

/// One pending scheduled message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduledEntry {
    pub msg: Message,
    pub core: CoreId,
    /// Delay asked for [ms].
    pub ms_requested: i32,
    /// Delta to the previous entry [ms].
    pub remaining: i32,
    next: Option<SlotId>,
}

/// Counts of waiting scheduled messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduledCounts {
    pub total: usize,
    /// Entries carrying the sleep handler.
    pub sleeps: usize,
    pub core0: usize,
    pub core1: usize,
}

/// The delta queue.
pub struct ScheduledList {
    pool: Pool<ScheduledEntry, SCHEDULED_MSGS_MAX>,
    head: Option<SlotId>,
}

impl Default for ScheduledList {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduledList {
    pub fn new() -> Self {
        Self {
            pool: Pool::new("scheduled messages"),
            head: None,
        }
    }

    /// Queue `msg` to be posted to `core` after `ms` ticks.
    ///
    /// Delays below one tick fire on the next tick. Halts when every entry
    /// is in use, after logging the outstanding entries.
    pub fn insert(&mut self, core: CoreId, ms: i32, msg: Message) {
        let mut remaining = ms.max(1);
        let entry = ScheduledEntry {
            msg,
            core,
            ms_requested: ms,
            remaining,
            next: None,
        };
        let id = match self.pool.try_alloc(entry) {
            Ok(id) => id,
            Err(_) => {
                self.log_entries();
                fatal!(
                    "out of scheduled message entries ({SCHEDULED_MSGS_MAX}) scheduling {} on {core}",
                    msg.id
                );
            }
        };

        // Equal times go after the entries already there.
        let mut prev: Option<SlotId> = None;
        let mut cur = self.head;
        while let Some(node) = cur {
            let delta = self.pool.get(node).remaining;
            if remaining < delta {
                self.pool.get_mut(node).remaining = delta - remaining;
                break;
            }
            remaining -= delta;
            prev = cur;
            cur = self.pool.get(node).next;
        }

        let new = self.pool.get_mut(id);
        new.remaining = remaining;
        new.next = cur;
        match prev {
            Some(p) => self.pool.get_mut(p).next = Some(id),
            None => self.head = Some(id),
        }
    }

    /// Advance one tick. Due messages are appended to `fired`.
    pub fn tick(&mut self, fired: &mut FiredBatch) {
        let Some(head) = self.head else {
            return;
        };
        let entry = self.pool.get_mut(head);
        entry.remaining -= 1;
        if entry.remaining > 0 {
            return;
        }
        while let Some(id) = self.head {
            let entry = *self.pool.get(id);
            if entry.remaining > 0 {
                break;
            }
            if fired.push((entry.core, entry.msg)).is_err() {
                fatal!("fired batch overflow");
            }
            self.head = entry.next;
            self.pool.free(id);
        }
    }

    /// Remove the first entry for `core` with kind `id` and forced handler
    /// `hdlr` (both must match exactly).
    ///
    /// Returns the milliseconds it had left to fire, or 0 when nothing
    /// matched.
    pub fn cancel(&mut self, id: MsgId, hdlr: Option<Handler>, core: CoreId) -> i32 {
        let mut prev: Option<SlotId> = None;
        let mut cur = self.head;
        let mut elapsed = 0;
        while let Some(node) = cur {
            let entry = *self.pool.get(node);
            elapsed += entry.remaining;
            if entry.core == core && entry.msg.id == id && entry.msg.hdlr == hdlr {
                match prev {
                    Some(p) => self.pool.get_mut(p).next = entry.next,
                    None => self.head = entry.next,
                }
                if let Some(next) = entry.next {
                    self.pool.get_mut(next).remaining += entry.remaining;
                }
                self.pool.free(node);
                return elapsed.max(0);
            }
            prev = cur;
            cur = entry.next;
        }
        0
    }

    /// Whether an entry for `core` with kind `id` is waiting. A `hdlr` of
    /// `None` matches any forced handler.
    pub fn exists(&self, core: CoreId, id: MsgId, hdlr: Option<Handler>) -> bool {
        self.iter().any(|(e, _)| {
            e.core == core && e.msg.id == id && (hdlr.is_none() || e.msg.hdlr == hdlr)
        })
    }

    /// Waiting entries by core. `sleep` identifies `run_after_ms` entries.
    pub fn counts(&self, sleep: Handler) -> ScheduledCounts {
        let mut counts = ScheduledCounts::default();
        for (e, _) in self.iter() {
            counts.total += 1;
            if e.msg.hdlr == Some(sleep) {
                counts.sleeps += 1;
            }
            match e.core {
                CoreId::Core0 => counts.core0 += 1,
                CoreId::Core1 => counts.core1 += 1,
            }
        }
        counts
    }

    /// Entries in firing order with their absolute time to fire [ms].
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cur: self.head,
            elapsed: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pool.in_use()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub const fn capacity(&self) -> usize {
        SCHEDULED_MSGS_MAX
    }

    /// Log every pool slot, allocated or not.
    pub fn log_entries(&self) {
        tracing::error!(
            "scheduled message pool: {} of {} in use",
            self.pool.in_use(),
            self.pool.capacity()
        );
        for (slot, e, in_use) in self.pool.slots() {
            tracing::error!(
                slot = slot.index(),
                id = %e.msg.id,
                hdlr = ?e.msg.hdlr,
                core = %e.core,
                requested = e.ms_requested,
                remaining = e.remaining,
                in_use,
                "scheduled entry"
            );
        }
    }
}

/// Iterator over waiting entries, see [`ScheduledList::iter`].
pub struct Iter<'a> {
    list: &'a ScheduledList,
    cur: Option<SlotId>,
    elapsed: i32,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a ScheduledEntry, i32);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        let entry = self.list.pool.get(id);
        self.elapsed += entry.remaining;
        self.cur = entry.next;
        Some((entry, self.elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler;
    use crate::runtime::Cmt;

    fn h1(_: &Cmt, _: &mut Message) {}
    fn h2(_: &Cmt, _: &mut Message) {}

    fn absolute(list: &ScheduledList) -> std::vec::Vec<(MsgId, i32)> {
        list.iter().map(|(e, t)| (e.msg.id, t)).collect()
    }

    fn run_ticks(list: &mut ScheduledList, n: usize) -> std::vec::Vec<(usize, MsgId)> {
        let mut out = std::vec::Vec::new();
        for tick in 1..=n {
            let mut fired = FiredBatch::new();
            list.tick(&mut fired);
            out.extend(fired.iter().map(|(_, m)| (tick, m.id)));
        }
        out
    }

    #[test]
    fn deltas_sum_to_absolute_times() {
        let mut list = ScheduledList::new();
        list.insert(CoreId::Core0, 100, Message::new(MsgId::AppTest));
        list.insert(CoreId::Core0, 30, Message::new(MsgId::HwrtTest));
        list.insert(CoreId::Core1, 60, Message::new(MsgId::Exec));
        list.insert(CoreId::Core1, 200, Message::new(MsgId::RotaryChg));
        assert_eq!(
            absolute(&list),
            vec![
                (MsgId::HwrtTest, 30),
                (MsgId::Exec, 60),
                (MsgId::AppTest, 100),
                (MsgId::RotaryChg, 200),
            ]
        );
        let deltas: std::vec::Vec<_> = list.iter().map(|(e, _)| e.remaining).collect();
        assert_eq!(deltas, vec![30, 30, 40, 100]);
    }

    #[test]
    fn absolute_times_track_ticks() {
        let mut list = ScheduledList::new();
        list.insert(CoreId::Core0, 10, Message::new(MsgId::AppTest));
        run_ticks(&mut list, 4);
        list.insert(CoreId::Core0, 3, Message::new(MsgId::HwrtTest));
        assert_eq!(
            absolute(&list),
            vec![(MsgId::HwrtTest, 3), (MsgId::AppTest, 6)]
        );
    }

    #[test]
    fn ties_fire_together_in_insertion_order() {
        let mut list = ScheduledList::new();
        let ids = [MsgId::AppTest, MsgId::HwrtTest, MsgId::Exec, MsgId::RotaryChg];
        for id in ids {
            list.insert(CoreId::Core0, 5, Message::new(id));
        }
        let fired = run_ticks(&mut list, 5);
        assert_eq!(fired, ids.iter().map(|&id| (5, id)).collect::<std::vec::Vec<_>>());
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn cancel_keeps_later_fire_time() {
        let mut list = ScheduledList::new();
        list.insert(CoreId::Core0, 100, Message::new(MsgId::AppTest));
        list.insert(CoreId::Core0, 50, Message::new(MsgId::HwrtTest));
        assert_eq!(list.cancel(MsgId::HwrtTest, None, CoreId::Core0), 50);
        assert_eq!(absolute(&list), vec![(MsgId::AppTest, 100)]);

        let fired = run_ticks(&mut list, 100);
        assert_eq!(fired, vec![(100, MsgId::AppTest)]);
    }

    #[test]
    fn cancel_reports_absolute_remaining() {
        let mut list = ScheduledList::new();
        list.insert(CoreId::Core0, 20, Message::new(MsgId::AppTest));
        list.insert(CoreId::Core0, 50, Message::new(MsgId::HwrtTest));
        run_ticks(&mut list, 5);
        assert_eq!(list.cancel(MsgId::HwrtTest, None, CoreId::Core0), 45);
    }

    #[test]
    fn cancel_matches_core_kind_and_handler() {
        let mut list = ScheduledList::new();
        list.insert(CoreId::Core1, 10, Message::exec(handler!(h1)));
        assert_eq!(list.cancel(MsgId::Exec, Some(handler!(h1)), CoreId::Core0), 0);
        assert_eq!(list.cancel(MsgId::Exec, Some(handler!(h2)), CoreId::Core1), 0);
        assert_eq!(list.cancel(MsgId::Exec, None, CoreId::Core1), 0);
        assert_eq!(list.cancel(MsgId::Exec, Some(handler!(h1)), CoreId::Core1), 10);
        assert_eq!(list.cancel(MsgId::Exec, Some(handler!(h1)), CoreId::Core1), 0);
    }

    #[test]
    fn exists_with_any_handler() {
        let mut list = ScheduledList::new();
        list.insert(CoreId::Core0, 10, Message::exec(handler!(h1)));
        assert!(list.exists(CoreId::Core0, MsgId::Exec, None));
        assert!(list.exists(CoreId::Core0, MsgId::Exec, Some(handler!(h1))));
        assert!(!list.exists(CoreId::Core0, MsgId::Exec, Some(handler!(h2))));
        assert!(!list.exists(CoreId::Core1, MsgId::Exec, None));
    }

    #[test]
    fn zero_delay_fires_next_tick_without_shifting_others() {
        let mut list = ScheduledList::new();
        list.insert(CoreId::Core0, 3, Message::new(MsgId::AppTest));
        list.insert(CoreId::Core0, 0, Message::new(MsgId::HwrtTest));
        let fired = run_ticks(&mut list, 3);
        assert_eq!(fired, vec![(1, MsgId::HwrtTest), (3, MsgId::AppTest)]);
    }

    #[test]
    fn counts_by_core_and_sleep() {
        let mut list = ScheduledList::new();
        list.insert(CoreId::Core0, 10, Message::with_handler(MsgId::CmtSleep, handler!(h1)));
        list.insert(CoreId::Core1, 10, Message::new(MsgId::AppTest));
        list.insert(CoreId::Core1, 20, Message::new(MsgId::AppTest));
        let counts = list.counts(handler!(h1));
        assert_eq!(
            counts,
            ScheduledCounts {
                total: 3,
                sleeps: 1,
                core0: 1,
                core1: 2
            }
        );
    }
}
