//! Core identity and handler affinity.

use std::cell::Cell;
use std::fmt;

/// Number of message-loop cores.
pub const CORE_COUNT: usize = 2;

/// One of the two message-loop execution contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum CoreId {
    #[default]
    Core0 = 0,
    Core1 = 1,
}

thread_local! {
    static CURRENT_CORE: Cell<CoreId> = const { Cell::new(CoreId::Core0) };
}

impl CoreId {
    /// Both cores, in index order.
    pub const ALL: [CoreId; CORE_COUNT] = [CoreId::Core0, CoreId::Core1];

    /// Array index of this core.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The other core.
    #[inline]
    pub const fn other(self) -> CoreId {
        match self {
            CoreId::Core0 => CoreId::Core1,
            CoreId::Core1 => CoreId::Core0,
        }
    }

    /// Core of the calling thread.
    ///
    /// Set by the dispatch loop; threads that never entered one report
    /// `Core0`.
    pub fn current() -> CoreId {
        CURRENT_CORE.with(Cell::get)
    }

    /// Mark the calling thread as running this core's message loop.
    pub fn bind_current(self) {
        CURRENT_CORE.with(|c| c.set(self));
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Core{}", self.index())
    }
}

/// Which core(s) a registered handler runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Affinity {
    /// Only on this core.
    Core(CoreId),
    /// On whichever core dispatches the message.
    #[default]
    Both,
}

impl Affinity {
    /// Whether a handler with this affinity runs when `core` dispatches.
    #[inline]
    pub const fn matches(self, core: CoreId) -> bool {
        match self {
            Affinity::Both => true,
            Affinity::Core(c) => c as u8 == core as u8,
        }
    }
}

impl From<CoreId> for Affinity {
    fn from(core: CoreId) -> Self {
        Affinity::Core(core)
    }
}

impl fmt::Display for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Affinity::Core(c) => write!(f, "{c}"),
            Affinity::Both => f.write_str("Both"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_defaults_to_core0() {
        std::thread::spawn(|| assert_eq!(CoreId::current(), CoreId::Core0))
            .join()
            .unwrap();
    }

    #[test]
    fn bind_current_is_per_thread() {
        std::thread::spawn(|| {
            CoreId::Core1.bind_current();
            assert_eq!(CoreId::current(), CoreId::Core1);
            std::thread::spawn(|| assert_eq!(CoreId::current(), CoreId::Core0))
                .join()
                .unwrap();
        })
        .join()
        .unwrap();
    }

    #[test]
    fn affinity_matching() {
        assert!(Affinity::Both.matches(CoreId::Core0));
        assert!(Affinity::Both.matches(CoreId::Core1));
        assert!(Affinity::Core(CoreId::Core1).matches(CoreId::Core1));
        assert!(!Affinity::Core(CoreId::Core1).matches(CoreId::Core0));
        assert_eq!(Affinity::from(CoreId::Core0), Affinity::Core(CoreId::Core0));
    }

    #[test]
    fn other_core() {
        assert_eq!(CoreId::Core0.other(), CoreId::Core1);
        assert_eq!(CoreId::Core1.other().index(), 0);
        assert_eq!(CoreId::Core1.to_string(), "Core1");
    }
}
