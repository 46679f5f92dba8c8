//! Fixed-capacity slot pool with an index free-list.
//!
//! All storage is allocated when the pool is built; `alloc`/`free` are O(1)
//! and never touch the heap. Slots are addressed by [`SlotId`], so links
//! between pooled records are plain indices that can be range-checked.

use static_assertions::const_assert;

use crate::fatal;

/// Largest pool the `u16` slot index can address.
pub const POOL_CAPACITY_LIMIT: usize = u16::MAX as usize;

/// Index of a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u16);

impl SlotId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Build an id from a raw index. The id is not guaranteed to be valid
    /// for any pool.
    #[inline]
    pub const fn from_raw(index: u16) -> Self {
        Self(index)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot<T> {
    value: T,
    in_use: bool,
    next_free: Option<SlotId>,
}

/// `N` pre-allocated records of `T`.
pub struct Pool<T, const N: usize> {
    name: &'static str,
    slots: [Slot<T>; N],
    free_head: Option<SlotId>,
    in_use: usize,
}

const_assert!(crate::schedule::SCHEDULED_MSGS_MAX <= POOL_CAPACITY_LIMIT);
const_assert!(crate::registry::HANDLER_ENTRIES_MAX <= POOL_CAPACITY_LIMIT);

impl<T: Copy + Default, const N: usize> Pool<T, N> {
    /// Build a pool with every slot on the free-list, lowest index first.
    pub fn new(name: &'static str) -> Self {
        let slots = std::array::from_fn(|i| Slot {
            value: T::default(),
            in_use: false,
            next_free: if i + 1 < N {
                Some(SlotId((i + 1) as u16))
            } else {
                None
            },
        });
        Self {
            name,
            slots,
            free_head: if N > 0 { Some(SlotId(0)) } else { None },
            in_use: 0,
        }
    }

    /// Take a free slot and store `value` in it.
    ///
    /// Hands `value` back when the pool is exhausted.
    pub fn try_alloc(&mut self, value: T) -> Result<SlotId, T> {
        let Some(id) = self.free_head else {
            return Err(value);
        };
        let slot = &mut self.slots[id.index()];
        self.free_head = slot.next_free.take();
        slot.value = value;
        slot.in_use = true;
        self.in_use += 1;
        Ok(id)
    }

    /// Take a free slot, halting if the pool is exhausted.
    pub fn alloc(&mut self, value: T) -> SlotId {
        match self.try_alloc(value) {
            Ok(id) => id,
            Err(_) => fatal!("pool '{}' exhausted ({N} entries)", self.name),
        }
    }

    /// Return a slot to the free-list.
    ///
    /// Freeing a slot that is not allocated means the links are corrupt and
    /// halts.
    pub fn free(&mut self, id: SlotId) {
        if !self.contains(id) {
            fatal!("pool '{}': free of unallocated slot {}", self.name, id.index());
        }
        let slot = &mut self.slots[id.index()];
        slot.in_use = false;
        slot.value = T::default();
        slot.next_free = self.free_head;
        self.free_head = Some(id);
        self.in_use -= 1;
    }

    /// Whether `id` is in range and currently allocated.
    #[inline]
    pub fn contains(&self, id: SlotId) -> bool {
        id.index() < N && self.slots[id.index()].in_use
    }

    /// Record in an allocated slot. Halts on an invalid id.
    #[inline]
    pub fn get(&self, id: SlotId) -> &T {
        if !self.contains(id) {
            fatal!("pool '{}': access to invalid slot {}", self.name, id.index());
        }
        &self.slots[id.index()].value
    }

    /// Mutable record in an allocated slot. Halts on an invalid id.
    #[inline]
    pub fn get_mut(&mut self, id: SlotId) -> &mut T {
        if !self.contains(id) {
            fatal!("pool '{}': access to invalid slot {}", self.name, id.index());
        }
        &mut self.slots[id.index()].value
    }

    /// Every slot in index order with its in-use flag.
    pub fn slots(&self) -> impl Iterator<Item = (SlotId, &T, bool)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| (SlotId(i as u16), &s.value, s.in_use))
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    #[inline]
    pub fn available(&self) -> usize {
        N - self.in_use
    }
}
