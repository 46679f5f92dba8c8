//! Runtime status commands.

use std::io::Write;

use fprog_cmt::{Cmt, CoreId};

use super::{Command, Shell, ShellError};

pub const PS: Command = Command::new(
    "ps",
    2,
    "",
    "Process status of both cores over the last second.",
    exec_ps,
);
pub const SCHED: Command = Command::new(
    "sched",
    2,
    "[-l]",
    "Scheduled messages waiting. -l also logs every entry.",
    exec_sched,
);
pub const HK: Command = Command::new("hk", 2, "", "Housekeeping messages handled.", exec_hk);

fn exec_ps(sh: &mut Shell, cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    if !args.is_empty() {
        return Err(PS.usage_error());
    }
    for core in CoreId::ALL {
        let ps = cmt.status_snapshot(core);
        let running = if cmt.message_loop_running(core) {
            "running"
        } else {
            "stopped"
        };
        writeln!(
            sh.out,
            "{core}: {running}, {} msgs, {}% busy, longest {} ({}us), irq {:08X}, queued {}, post errors {}, cur/last {}",
            ps.retrieved,
            ps.busy_percent(),
            ps.msg_longest,
            ps.t_msg_longest,
            ps.interrupt_status,
            cmt.queued(core),
            cmt.post_errors(core),
            cmt.curlast_msg(core),
        )?;
    }
    Ok(())
}

fn exec_sched(sh: &mut Shell, cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    match args {
        [] => {}
        ["-l"] => cmt.log_scheduled(),
        _ => return Err(SCHED.usage_error()),
    }
    let w = cmt.scheduled_msgs_waiting();
    writeln!(
        sh.out,
        "Scheduled: {} (sleeps {}) Core0 {} Core1 {}",
        w.total, w.sleeps, w.core0, w.core1
    )?;
    Ok(())
}

fn exec_hk(sh: &mut Shell, cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    if !args.is_empty() {
        return Err(HK.usage_error());
    }
    writeln!(sh.out, "Housekeeping: {}", cmt.housekeeping_count())?;
    Ok(())
}
