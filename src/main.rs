//! vivariumd: scheduled actuation daemon.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  SysfsGpio / SimGpio   LogEventSink    LocalClock            │
//! │  (GpioPort)            (EventSink)     (Clock)               │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │            ActuationEngine (pure logic)                │  │
//! │  │  TriggerRegistry · OutputBank · Boot reconciliation    │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                                              │
//! │  ctrlc handler ──▶ ShutdownHandle (all outputs OFF, exit 0)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{error, info, warn};

use vivarium::adapters::log_sink::LogEventSink;
use vivarium::adapters::sim_gpio::SimGpio;
use vivarium::adapters::sysfs_gpio::SysfsGpio;
use vivarium::adapters::time::LocalClock;
use vivarium::app::events::ShutdownSource;
use vivarium::app::ports::{EventSink, GpioPort};
use vivarium::app::service::ActuationEngine;
use vivarium::config::Config;
use vivarium::safety::ShutdownFlag;

/// Runs the signal-path shutdown once the engine is up.
type ShutdownHook = Box<dyn Fn() + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "vivariumd", version, about = "Scheduled grow-light and fogger actuation")]
struct Cli {
    /// Output declarations (YAML, or JSON for `.json` files)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log filter when RUST_LOG is unset (e.g. `info`, `debug`, `info,registry=debug`)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Drive an in-memory board instead of /sys/class/gpio
    #[arg(long)]
    simulate: bool,
}

fn init_logging(cli: &Cli) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}][{}][{}]: {}",
            Local::now().format("%H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    });
    if let Some(path) = &cli.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    info!("╔══════════════════════════════════════╗");
    info!("║  vivariumd v{:<25}║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1. Termination handler ────────────────────────────────
    //
    // Installed before any pin is claimed.  Until the engine publishes its
    // hook, a signal only raises the flag and startup winds down on its own.
    let flag = ShutdownFlag::new();
    let hook: Arc<OnceLock<ShutdownHook>> = Arc::new(OnceLock::new());
    {
        let flag = flag.clone();
        let hook = Arc::clone(&hook);
        if let Err(e) = ctrlc::set_handler(move || {
            info!("Signal: SIGINT/SIGTERM received");
            flag.request();
            if let Some(shutdown) = hook.get() {
                shutdown();
                info!("Signal: outputs safe, exiting");
                std::process::exit(0);
            }
        }) {
            warn!("Signal handler not installed ({}); outputs will not be reset on SIGTERM", e);
        }
    }

    // ── 2. Config ─────────────────────────────────────────────
    let config = Config::load(&cli.config)
        .inspect_err(|e| error!("Config {}: {}", cli.config.display(), e))?;
    info!(
        "Config: {} outputs ({} active) from {}",
        config.outputs.len(),
        config.active_outputs().count(),
        cli.config.display()
    );

    // ── 3. Engine ─────────────────────────────────────────────
    if cli.simulate {
        info!("GPIO: simulated board");
        run(&config, SimGpio::new(), flag, &hook)
    } else {
        info!(
            "GPIO: sysfs at {} ({:?} numbering)",
            config.engine.gpio_root.display(),
            config.engine.numbering
        );
        let gpio = SysfsGpio::new(&config.engine.gpio_root, config.engine.numbering);
        run(&config, gpio, flag, &hook)
    }
}

fn run<G: GpioPort>(
    config: &Config,
    mut gpio: G,
    flag: ShutdownFlag,
    hook: &OnceLock<ShutdownHook>,
) -> Result<()> {
    let sink: Arc<dyn EventSink> = Arc::new(LogEventSink::new());
    let mut engine = ActuationEngine::start(config, &mut gpio, LocalClock::new(), sink, flag)
        .inspect_err(|e| error!("Startup failed: {}", e))?;

    let handle = engine.shutdown_handle();
    let published = hook.set(Box::new(move || {
        handle.execute(ShutdownSource::Signal);
    }));
    if published.is_err() {
        warn!("Shutdown hook already set");
    }

    match engine.run() {
        Some(report) if report.failed > 0 => {
            warn!("Exit: {} outputs may still be energised", report.failed)
        }
        Some(_) => info!("Exit: clean"),
        None => info!("Exit: shutdown already handled by signal path"),
    }
    Ok(())
}
