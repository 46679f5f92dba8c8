//! Line-oriented terminal shell (runs on Core1).
//!
//! Characters arrive as `TermCharRcvd` messages. The shell assembles them
//! into a line and, on CR/LF, runs the command named by the first word.
//! A command may be abbreviated down to its minimum match length.
//!
//! Command output goes to the shell's writer, never to the log.

pub mod devrdwr;
pub mod status;

use std::io::{self, Write};

use fprog_board::{BoardError, DeviceOps};
use fprog_cmt::{Affinity, Cmt, CoreId, Handler, Message, MsgData, MsgId, handler};
use parking_lot::{Mutex, const_mutex};
use thiserror::Error;
use tracing::{debug, warn};

use self::devrdwr::DevRdWr;

/// Core the shell runs on.
pub const SHELL_CORE: CoreId = CoreId::Core1;

/// Longest accepted command line.
pub const LINE_MAX: usize = 128;

pub const PROMPT: &str = ": ";

const BS: char = '\x08';
const DEL: char = '\x7f';
/// Ctrl-X: discard the line.
const CAN: char = '\x18';

/// Shell command failure, reported to the user.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Unknown command: '{0}'. Type 'help' for the list.")]
    UnknownCommand(String),

    #[error("Usage: {name} {usage}")]
    Usage {
        name: &'static str,
        usage: &'static str,
    },

    #[error("Value error - '{0}' is not a valid hex address.")]
    BadAddress(String),

    #[error("Value error - '{0}' is not a valid hex byte.")]
    BadData(String),

    #[error("Device error: {0}")]
    Device(#[from] BoardError),

    #[error("Output error: {0}")]
    Io(#[from] io::Error),
}

/// Command entry point. `args` excludes the command name.
pub type CommandFn = fn(&mut Shell, &Cmt, &[&str]) -> Result<(), ShellError>;

/// A shell command.
#[derive(Clone, Copy)]
pub struct Command {
    pub name: &'static str,
    /// Shortest accepted abbreviation.
    pub min_match: usize,
    pub usage: &'static str,
    pub help: &'static str,
    exec: CommandFn,
}

impl Command {
    pub const fn new(
        name: &'static str,
        min_match: usize,
        usage: &'static str,
        help: &'static str,
        exec: CommandFn,
    ) -> Self {
        Self {
            name,
            min_match,
            usage,
            help,
            exec,
        }
    }

    /// Whether `word` names this command.
    pub fn matches(&self, word: &str) -> bool {
        word.len() >= self.min_match && word.len() <= self.name.len() && self.name.starts_with(word)
    }

    /// Usage error for this command.
    pub fn usage_error(&self) -> ShellError {
        ShellError::Usage {
            name: self.name,
            usage: self.usage,
        }
    }
}

const HELP: Command = Command::new("help", 1, "[command]", "List the commands, or describe one.", exec_help);

/// Every command, in help order.
pub static COMMANDS: [Command; 11] = [
    HELP,
    devrdwr::ADDR,
    devrdwr::NADDR,
    devrdwr::PWR,
    devrdwr::RD,
    devrdwr::NRD,
    devrdwr::WR,
    devrdwr::NWR,
    status::PS,
    status::SCHED,
    status::HK,
];

/// Look up the command named (or abbreviated) by `word`.
pub fn find_command(word: &str) -> Option<&'static Command> {
    let word = word.to_ascii_lowercase();
    COMMANDS.iter().find(|c| c.matches(&word))
}

/// Shell state: output writer, line being assembled, device command state.
pub struct Shell {
    out: Box<dyn Write + Send>,
    line: String,
    last_cr: bool,
    dev: DevRdWr,
}

impl Shell {
    pub fn new(out: Box<dyn Write + Send>, ops: &'static DeviceOps<'static>) -> Self {
        Self {
            out,
            line: String::with_capacity(LINE_MAX),
            last_cr: false,
            dev: DevRdWr::new(ops),
        }
    }

    /// Line assembled so far.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn dev(&self) -> &DevRdWr {
        &self.dev
    }

    pub fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "{PROMPT}")?;
        self.out.flush()
    }

    /// Feed one received character.
    pub fn input(&mut self, cmt: &Cmt, c: char) -> io::Result<()> {
        let after_cr = std::mem::replace(&mut self.last_cr, c == '\r');
        match c {
            '\n' if after_cr => Ok(()),
            '\r' | '\n' => {
                let line = std::mem::take(&mut self.line);
                self.run_line(cmt, &line)?;
                self.prompt()
            }
            BS | DEL => {
                self.line.pop();
                Ok(())
            }
            CAN => {
                self.line.clear();
                Ok(())
            }
            c if c.is_control() => Ok(()),
            c => {
                if self.line.len() < LINE_MAX {
                    self.line.push(c);
                }
                Ok(())
            }
        }
    }

    /// Run `line`, reporting a command failure to the user.
    pub fn run_line(&mut self, cmt: &Cmt, line: &str) -> io::Result<()> {
        match self.execute(cmt, line) {
            Ok(()) => Ok(()),
            Err(ShellError::Io(e)) => Err(e),
            Err(e) => {
                debug!("command '{line}' failed: {e}");
                writeln!(self.out, "{e}")
            }
        }
    }

    /// Parse and run one command line.
    ///
    /// Any command stops a repeating device operation; the repeat forms
    /// (`R`) start a new one.
    pub fn execute(&mut self, cmt: &Cmt, line: &str) -> Result<(), ShellError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(());
        };
        let args: Vec<&str> = words.collect();
        let cmd = find_command(name).ok_or_else(|| ShellError::UnknownCommand(name.to_string()))?;
        self.dev.stop_repeat(cmt);
        (cmd.exec)(self, cmt, &args)
    }

    fn help_line(&mut self, cmd: &Command) -> io::Result<()> {
        writeln!(self.out, "{:<6}{:<24}{}", cmd.name, cmd.usage, cmd.help)
    }
}

fn exec_help(sh: &mut Shell, _cmt: &Cmt, args: &[&str]) -> Result<(), ShellError> {
    match args {
        [] => {
            for cmd in &COMMANDS {
                sh.help_line(cmd)?;
            }
        }
        [name] => {
            let cmd = find_command(name).ok_or_else(|| ShellError::UnknownCommand(name.to_string()))?;
            sh.help_line(cmd)?;
        }
        _ => return Err(HELP.usage_error()),
    }
    Ok(())
}

// ─── Process-wide shell ─────────────────────────────────────────────

static SHELL: Mutex<Option<Shell>> = const_mutex(None);

/// Handler delivering terminal characters to the shell.
pub const TERM_HANDLER: Handler = handler!(handle_term_char);

/// Install `shell` as the process-wide shell, replacing any previous one.
pub fn install(shell: Shell) {
    *SHELL.lock() = Some(shell);
}

/// Run `f` on the installed shell. `None` if no shell is installed.
pub fn with_shell<R>(f: impl FnOnce(&mut Shell) -> R) -> Option<R> {
    SHELL.lock().as_mut().map(f)
}

/// Register the terminal handler on the shell core and show the prompt.
pub fn start(cmt: &Cmt) {
    cmt.add_handler_for(MsgId::TermCharRcvd, TERM_HANDLER, Affinity::Core(SHELL_CORE));
    if let Some(Err(e)) = with_shell(|sh| sh.prompt()) {
        warn!("shell output failed: {e}");
    }
}

fn handle_term_char(cmt: &Cmt, msg: &mut Message) {
    let MsgData::Char(c) = msg.data else {
        warn!(data = ?msg.data, "terminal message without a character");
        return;
    };
    match with_shell(|sh| sh.input(cmt, c)) {
        Some(Ok(())) => {}
        Some(Err(e)) => warn!("shell output failed: {e}"),
        None => debug!("no shell installed, dropped {c:?}"),
    }
}
