//! Terminal input: a reader thread standing in for the UART RX interrupt.
//!
//! Every character read from stdin is posted to Core1 as a
//! `TermCharRcvd` message.

use std::io::{self, Read};
use std::thread::{self, JoinHandle};

use fprog_cmt::{Cmt, CoreId, Message, MsgData, MsgId};
use tracing::{debug, info, warn};

/// Core the terminal characters are delivered to.
pub const TERM_CORE: CoreId = CoreId::Core1;

/// Spawn the stdin reader thread.
pub fn spawn_stdin_reader(cmt: &'static Cmt) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-rx".into())
        .spawn(move || {
            let stdin = io::stdin();
            let n = forward_chars(cmt, stdin.lock());
            info!(chars = n, "stdin closed");
        })
}

/// Post every character of `input` to the terminal core until EOF or a
/// read error. Returns the number of characters posted.
pub fn forward_chars<R: Read>(cmt: &Cmt, input: R) -> usize {
    let mut n = 0;
    for byte in input.bytes() {
        match byte {
            Ok(b) => {
                cmt.post_blocking(
                    TERM_CORE,
                    Message::new(MsgId::TermCharRcvd).data(MsgData::Char(char::from(b))),
                );
                n += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                debug!("stdin read interrupted");
            }
            Err(e) => {
                warn!("stdin read failed: {e}");
                break;
            }
        }
    }
    n
}
