//! Optional real-time setup for the core and ticker threads.
//!
//! With the `rt` feature, a core thread is pinned to one CPU and the
//! ticker thread may be given `SCHED_FIFO` priority. Without it every call
//! is a no-op so simulation builds run anywhere.

use thiserror::Error;

/// RT setup failure.
#[derive(Debug, Error)]
pub enum RtError {
    #[error("CPU affinity setup failed: {0}")]
    Affinity(String),
    #[error("scheduler setup failed: {0}")]
    Scheduler(String),
}

/// Pin the calling thread to `cpu`.
#[cfg(feature = "rt")]
pub fn pin_current_thread(cpu: usize) -> Result<(), RtError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| RtError::Affinity(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| RtError::Affinity(format!("sched_setaffinity failed: {e}")))?;
    Ok(())
}

#[cfg(not(feature = "rt"))]
pub fn pin_current_thread(_cpu: usize) -> Result<(), RtError> {
    Ok(()) // No-op in simulation mode
}

/// Run the calling thread under `SCHED_FIFO` at `priority`.
#[cfg(feature = "rt")]
pub fn set_fifo_priority(priority: i32) -> Result<(), RtError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(RtError::Scheduler(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
pub fn set_fifo_priority(_priority: i32) -> Result<(), RtError> {
    Ok(()) // No-op in simulation mode
}
