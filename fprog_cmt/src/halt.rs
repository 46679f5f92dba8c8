//! Fatal halt path.
//!
//! Invariant violations (pool exhaustion, must-deliver queue overflow,
//! double initialization, registry corruption) are not recoverable. They
//! log at `error!`, light the halt indicator if one is installed, then
//! panic. The binary chains a stop after the panic hook
//! ([`install_stop_on_panic`]), so a halt on any thread stops the process
//! the way a device halt needs a physical reset.

use std::fmt;
use std::sync::OnceLock;

static HALT_INDICATOR: OnceLock<fn()> = OnceLock::new();

/// Install the hook run right before halting (e.g. an error LED).
///
/// Only the first installation takes effect; returns `false` afterwards.
pub fn set_halt_indicator(indicator: fn()) -> bool {
    HALT_INDICATOR.set(indicator).is_ok()
}

/// Chain `stop` after the current panic hook.
///
/// Tests leave this uninstalled so `catch_unwind` still observes halts.
pub fn install_stop_on_panic(stop: fn()) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        stop();
    }));
}

/// Log `args`, fire the halt indicator and stop.
#[cold]
#[inline(never)]
#[track_caller]
pub fn board_panic(args: fmt::Arguments<'_>) -> ! {
    let location = std::panic::Location::caller();
    tracing::error!(target: "fprog::halt", %location, "HALT: {args}");
    if let Some(indicator) = HALT_INDICATOR.get() {
        indicator();
    }
    panic!("HALT: {args}");
}

/// Halt with a formatted message. See [`board_panic`].
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::halt::board_panic(format_args!($($arg)*))
    };
}
