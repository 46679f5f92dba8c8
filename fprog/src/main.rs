//! # fprog binary
//!
//! Starts both cores of the flash programmer on the host: Core1 on its
//! own thread running the shell, Core0 on the main thread with the timer
//! ticker and the terminal reader.
//!
//! # Usage
//!
//! ```bash
//! # Simulation board, defaults when the config file is missing
//! fprog --config config/fprog.toml
//!
//! # Verbose / JSON logging
//! fprog -v --json
//! ```

use std::io;
use std::path::PathBuf;
use std::thread;

use clap::Parser;
use fprog::app::{self, StartupError};
use fprog::shell::{self, Shell};
use fprog::term;
use fprog_cmt::{CoreId, HostPlatform, halt, rt};
use fprog_common::prelude::*;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// fprog - dual-core flash programmer
#[derive(Parser, Debug)]
#[command(name = "fprog")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Flash programmer on a cooperative multi-tasking runtime")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

static PLATFORM: HostPlatform = HostPlatform::new();

fn main() {
    if let Err(e) = run() {
        error!("FATAL: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), StartupError> {
    let args = Args::parse();
    app::install_abort_on_halt();

    let loaded = ProgrammerConfig::load(&args.config);
    let level = match &loaded {
        Ok(config) if !args.verbose => config.shared.log_level.into(),
        _ if args.verbose => Level::DEBUG,
        _ => Level::INFO,
    };
    setup_tracing(level, args.json);

    let config = match loaded {
        Ok(config) => config,
        Err(ConfigError::FileNotFound) => {
            warn!("No config at {}, using defaults", args.config.display());
            ProgrammerConfig::default()
        }
        Err(e) => return Err(e.into()),
    };
    config.validate()?;

    info!(
        "{} v{} starting...",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION")
    );

    if !halt::set_halt_indicator(app::halt_indicator) {
        warn!("Halt indicator already installed");
    }
    let cmt = fprog_cmt::init(config.cmt.clone(), &PLATFORM);
    let ops = app::init_device(&config.board)?;
    shell::install(Shell::new(Box::new(io::stdout()), ops));

    ctrlc::set_handler(|| {
        info!("Received shutdown signal");
        std::process::exit(0);
    })?;

    thread::Builder::new().name("core1".into()).spawn(move || {
        if let Err(e) = rt::pin_current_thread(app::CORE1_CPU) {
            warn!("Core1 not pinned: {e}");
        }
        cmt.dispatch_forever(CoreId::Core1, Some(app::CORE1_STARTED));
    })?;

    if let Err(e) = rt::pin_current_thread(app::CORE0_CPU) {
        warn!("Core0 not pinned: {e}");
    }
    cmt.start_ticker()?;
    term::spawn_stdin_reader(cmt)?;
    cmt.dispatch_forever(CoreId::Core0, Some(app::CORE0_STARTED))
}

/// Setup tracing subscriber.
fn setup_tracing(level: Level, json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
