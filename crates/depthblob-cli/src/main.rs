//! `depthblob` – run the blob detector against a depth sensor.
//!
//! 1. Loads `~/.depthblob/config.toml` (or `--config`), falling back to
//!    defaults when the file is absent.
//! 2. Starts the sensor on its own capture thread, handing frames over
//!    through a latest-frame slot.
//! 3. Feeds frames through the auto-calibrating pipeline and prints each
//!    event, either as coloured text or as JSON lines (`--json`).
//! 4. Intercepts **Ctrl-C** to stop capture and print a summary.

mod config;
mod report;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use depthblob_hal::capture::spawn_capture;
use depthblob_hal::sim::SimDepthSensor;
use depthblob_hal::slot::LatestFrameSlot;
use depthblob_runtime::pipeline::FramePipeline;
use depthblob_runtime::telemetry::init_tracing;

use crate::report::Reporter;

#[derive(Parser)]
#[command(name = "depthblob")]
#[command(about = "Background-subtraction blob detection for static depth sensors")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: ~/.depthblob/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the detector (default)
    Run(RunArgs),

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Stop after this many frames (0 = until Ctrl-C)
    #[arg(short, long, default_value = "0")]
    frames: u64,

    /// Emit one JSON object per event on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing("depthblob");
    let path = cli.config.unwrap_or_else(config::config_path);

    let result = match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(&path, &args),
        Commands::Init { force } => init(&path, force),
        Commands::ShowConfig => show_config(&path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn run(path: &Path, args: &RunArgs) -> Result<(), String> {
    let cfg = config::load(path)?;
    if !args.json {
        print_banner();
        println!("  Config: {}", path.display().to_string().bold());
    }

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let quiet = args.json;
    if let Err(e) = ctrlc::set_handler(move || {
        if !quiet {
            println!();
            println!("{}", "⚠  Ctrl-C received – stopping capture …".yellow().bold());
        }
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    // ── Sensor and capture thread ─────────────────────────────────────────
    let mut scene = cfg.sensor.scene.clone();
    // Keep the simulated objects out of the calibration run.
    scene.empty_frames = scene.empty_frames.max(cfg.calibration_frames as u64);
    let sensor = SimDepthSensor::new(cfg.sensor.id.clone(), scene);
    let period = Duration::from_secs(1) / cfg.sensor.fps.max(1);
    let slot = LatestFrameSlot::new();
    let mut capture = spawn_capture(sensor, slot.clone(), period);
    info!(sensor = %cfg.sensor.id, fps = cfg.sensor.fps, "sensor started");

    // ── Consumer loop ─────────────────────────────────────────────────────
    let mut pipeline = FramePipeline::new(cfg.pipeline());
    let mut reporter = Reporter::new(args.json, cfg.aim_points.clone());
    let idle = (period / 4).max(Duration::from_millis(1));

    while !shutdown.load(Ordering::SeqCst) {
        let Some(frame) = slot.take() else {
            if !capture.is_running() {
                warn!("capture stopped");
                break;
            }
            std::thread::sleep(idle);
            continue;
        };

        match pipeline.process(&frame) {
            Ok(event) => reporter.event(&event),
            Err(e) => reporter.rejected(&e),
        }

        if args.frames > 0 && pipeline.stats().frames >= args.frames {
            break;
        }
    }

    capture.stop();
    reporter.summary(&pipeline.stats(), slot.dropped());
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<(), String> {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    config::save_to(&config::Config::default(), path)?;
    println!(
        "  {} Config saved to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

fn show_config(path: &Path) -> Result<(), String> {
    let cfg = config::load(path)?;
    let raw =
        toml::to_string_pretty(&cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    print!("{raw}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {} {}",
        "depthblob".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Depth-camera blob detection");
    println!();
}
