//! Handler registry: one list of registered handlers per message kind.
//!
//! Adding prepends, so handlers for a kind run most-recently-added first.

use heapless::Vec;

use crate::core::{Affinity, CoreId};
use crate::fatal;
use crate::message::{Handler, MSG_ID_CNT, MsgId};
use crate::pool::{Pool, SlotId};

/// Handler registrations outstanding at once.
pub const HANDLER_ENTRIES_MAX: usize = MSG_ID_CNT * 4;

/// Handlers one kind may have registered.
pub const MAX_HANDLERS_PER_KIND: usize = 16;

/// Handlers selected for one dispatch, in invocation order.
pub type HandlerSnapshot = Vec<Handler, MAX_HANDLERS_PER_KIND>;

#[derive(Debug, Clone, Copy, Default)]
struct HandlerEntry {
    handler: Option<Handler>,
    affinity: Affinity,
    next: Option<SlotId>,
}

/// Per-kind handler lists over a shared entry pool.
pub struct HandlerRegistry {
    heads: [Option<SlotId>; MSG_ID_CNT],
    pool: Pool<HandlerEntry, HANDLER_ENTRIES_MAX>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            heads: [None; MSG_ID_CNT],
            pool: Pool::new("message handlers"),
        }
    }

    /// Register `handler` for `id`. It runs before the handlers already
    /// registered for that kind.
    pub fn add(&mut self, id: MsgId, handler: Handler, affinity: Affinity) {
        let count = self.count(id);
        if count >= MAX_HANDLERS_PER_KIND {
            fatal!("too many handlers for msg {id} ({count})");
        }
        let entry = HandlerEntry {
            handler: Some(handler),
            affinity,
            next: self.heads[id.index()],
        };
        let slot = self.pool.alloc(entry);
        self.heads[id.index()] = Some(slot);
    }

    /// Unregister the first entry matching `handler` and `affinity` exactly.
    ///
    /// Returns `false` when no entry matched.
    pub fn remove(&mut self, id: MsgId, handler: Handler, affinity: Affinity) -> bool {
        let mut prev: Option<SlotId> = None;
        let mut cur = self.heads[id.index()];
        while let Some(node) = cur {
            let entry = *self.pool.get(node);
            if entry.handler == Some(handler) && entry.affinity == affinity {
                match prev {
                    Some(p) => self.pool.get_mut(p).next = entry.next,
                    None => self.heads[id.index()] = entry.next,
                }
                self.pool.free(node);
                return true;
            }
            prev = cur;
            cur = entry.next;
        }
        false
    }

    /// Handlers for `id` that run on `core`, in invocation order.
    pub fn handlers_for(&self, id: MsgId, core: CoreId) -> HandlerSnapshot {
        let mut out = HandlerSnapshot::new();
        let mut cur = self.heads[id.index()];
        while let Some(node) = cur {
            let entry = self.pool.get(node);
            if let Some(h) = entry.handler
                && entry.affinity.matches(core)
                && out.push(h).is_err()
            {
                fatal!("msg {id}: handler list longer than {MAX_HANDLERS_PER_KIND}");
            }
            cur = entry.next;
        }
        out
    }

    /// Handlers registered for `id`, any core.
    pub fn count(&self, id: MsgId) -> usize {
        let mut n = 0;
        let mut cur = self.heads[id.index()];
        while let Some(node) = cur {
            n += 1;
            cur = self.pool.get(node).next;
        }
        n
    }

    /// Registrations across all kinds.
    pub fn len(&self) -> usize {
        self.pool.in_use()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.in_use() == 0
    }

    /// Walk every list and halt on a link outside the pool, a link to a
    /// free entry, an entry without a handler, or a cycle.
    pub fn verify(&self) {
        let mut seen = 0usize;
        for (kind, head) in self.heads.iter().enumerate() {
            let mut cur = *head;
            let mut steps = 0usize;
            while let Some(node) = cur {
                if node.index() >= self.pool.capacity() {
                    fatal!(
                        "handler registry corrupt: msg {kind:02X} links to slot {} outside pool",
                        node.index()
                    );
                }
                if !self.pool.contains(node) {
                    fatal!(
                        "handler registry corrupt: msg {kind:02X} links to free slot {}",
                        node.index()
                    );
                }
                let entry = self.pool.get(node);
                if entry.handler.is_none() {
                    fatal!(
                        "handler registry corrupt: msg {kind:02X} slot {} has no handler",
                        node.index()
                    );
                }
                steps += 1;
                if steps > self.pool.capacity() {
                    fatal!("handler registry corrupt: msg {kind:02X} list loops");
                }
                cur = entry.next;
            }
            seen += steps;
        }
        if seen != self.pool.in_use() {
            fatal!(
                "handler registry corrupt: {seen} linked entries, {} allocated",
                self.pool.in_use()
            );
        }
        tracing::trace!(entries = seen, "handler registry verified");
    }
}
