//! Per-core bounded FIFO message queues.
//!
//! The critical section is a short `parking_lot` lock around a
//! `heapless::Deque`; the ticker thread posts into the same queues the
//! cores post into.

use heapless::{Deque, Vec};
use parking_lot::{Condvar, Mutex};
use static_assertions::const_assert;

use crate::core::CoreId;
use crate::message::{Message, MsgId};

/// Messages each core queue holds.
pub const CORE_QUEUE_CAPACITY: usize = 64;

const_assert!(CORE_QUEUE_CAPACITY > 0);

/// Ids of the messages waiting in a queue, oldest first.
pub type PendingIds = Vec<MsgId, CORE_QUEUE_CAPACITY>;

/// Bounded FIFO feeding one core's message loop.
pub struct CoreQueue {
    core: CoreId,
    inner: Mutex<Deque<Message, CORE_QUEUE_CAPACITY>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl CoreQueue {
    pub fn new(core: CoreId) -> Self {
        Self {
            core,
            inner: Mutex::new(Deque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    #[inline]
    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Enqueue without blocking. Hands the message back when full.
    pub fn try_add(&self, msg: Message) -> Result<(), Message> {
        let mut q = self.inner.lock();
        q.push_back(msg)?;
        drop(q);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue, waiting for room.
    pub fn add_blocking(&self, msg: Message) {
        let mut q = self.inner.lock();
        while q.is_full() {
            self.not_full.wait(&mut q);
        }
        // Room was checked under the same lock.
        let _ = q.push_back(msg);
        drop(q);
        self.not_empty.notify_one();
    }

    /// Dequeue without blocking.
    pub fn try_remove(&self) -> Option<Message> {
        let msg = self.inner.lock().pop_front();
        if msg.is_some() {
            self.not_full.notify_one();
        }
        msg
    }

    /// Dequeue, waiting for a message.
    pub fn remove_blocking(&self) -> Message {
        let mut q = self.inner.lock();
        loop {
            if let Some(msg) = q.pop_front() {
                drop(q);
                self.not_full.notify_one();
                return msg;
            }
            self.not_empty.wait(&mut q);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub const fn capacity(&self) -> usize {
        CORE_QUEUE_CAPACITY
    }

    /// Ids of the waiting messages (overflow diagnostics).
    pub fn pending_ids(&self) -> PendingIds {
        let q = self.inner.lock();
        let mut ids = PendingIds::new();
        for msg in q.iter() {
            // Same capacity as the queue.
            let _ = ids.push(msg.id);
        }
        ids
    }
}
