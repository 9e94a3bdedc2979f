//! Turbidostat controller: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimulatedCulture  GpioActuator   CsvSink        SystemClock   │
//! │  (SensorPort)      (ActuatorPort) (Persistence)  (Clock)       │
//! │  host_metrics()    LogEventSink   JsonConfigFile               │
//! │  (HostMetrics)     (EventSink)    (ConfigPort)                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              ControlLoop (pure logic)                  │    │
//! │  │  LoopClock · triggers · ThresholdPolicy · buffer       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pump outputs are simulated pins wired into the simulated culture, so
//! the binary runs on any development host.  Ctrl-C stops the loop after
//! the current tick, flushes, and releases the pumps.
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use turbidostat::adapters::config_file::JsonConfigFile;
use turbidostat::adapters::csv_sink::CsvSink;
use turbidostat::adapters::gpio::GpioActuator;
use turbidostat::adapters::log_sink::LogEventSink;
use turbidostat::adapters::metrics::host_metrics;
use turbidostat::adapters::sim::{SimulatedCulture, SimulatedPin};
use turbidostat::adapters::time::SystemClock;
use turbidostat::app::events::StopReason;
use turbidostat::app::ports::ConfigPort;
use turbidostat::app::service::{ControlLoop, LoopPorts};

/// Starting density of the simulated culture, in raw counts.
const SIM_INITIAL_OD: f64 = 400.0;

#[derive(Debug, Parser)]
#[command(version, about = "Optical-density feedback controller for a bioreactor")]
struct Cli {
    /// JSON configuration file (defaults are used if it does not exist).
    #[arg(long, default_value = "turbidostat.json")]
    config: PathBuf,

    /// Stop after this many ticks.
    #[arg(long, conflicts_with = "forever")]
    iterations: Option<u64>,

    /// Run until interrupted.
    #[arg(long)]
    forever: bool,

    /// Directory for flushed sample files.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Write the effective configuration to --config and exit.
    #[arg(long)]
    write_default_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("Turbidostat v{}", env!("CARGO_PKG_VERSION"));

    // ── Configuration ─────────────────────────────────────────
    let store = JsonConfigFile::new(&cli.config);
    let mut config = store
        .load()
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(n) = cli.iterations {
        config.max_iterations = Some(n);
    }
    if cli.forever {
        config.max_iterations = None;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    config.validate().context("invalid configuration")?;

    if cli.write_default_config {
        store
            .save(&config)
            .with_context(|| format!("writing config to {}", cli.config.display()))?;
        info!("Config written to {}", cli.config.display());
        return Ok(());
    }

    // ── Adapters ──────────────────────────────────────────────
    let (drug_pin, drug_probe) = SimulatedPin::new("drug");
    let (nutrient_pin, nutrient_probe) = SimulatedPin::new("nutrient");
    let (waste_pin, _waste_probe) = SimulatedPin::new("waste");
    let actuator = GpioActuator::new([
        (config.pumps.drug.pin, drug_pin),
        (config.pumps.nutrient.pin, nutrient_pin),
        (config.pumps.waste.pin, waste_pin),
    ])
    .context("initialising pump outputs")?;
    let mut sensor = SimulatedCulture::new(SIM_INITIAL_OD, drug_probe, nutrient_probe);

    let sink = CsvSink::new(&config.data_dir)
        .with_context(|| format!("preparing data directory {}", config.data_dir.display()))?;
    info!("Flushing samples to {}", sink.dir().display());

    let ports = LoopPorts {
        actuator: Arc::new(actuator),
        persistence: Arc::new(sink),
        metrics: host_metrics(),
        clock: Arc::new(SystemClock::new()),
    };
    let mut control = ControlLoop::new(&config, ports).context("building control loop")?;

    let stop = control.stop_handle();
    ctrlc::set_handler(move || {
        warn!("Interrupt received; stopping after the current tick");
        stop.stop();
    })
    .context("installing Ctrl-C handler")?;

    // ── Run ───────────────────────────────────────────────────
    let report = control.run(&mut sensor, &mut LogEventSink::new());

    if report.reason == StopReason::Cancelled {
        info!("Stopped early after {} ticks", report.loop_count);
    }
    if report.persistence_failures > 0 || report.actuation_failures > 0 {
        warn!(
            "Run finished with {} failed flushes and {} failed output writes",
            report.persistence_failures, report.actuation_failures
        );
    }
    Ok(())
}
