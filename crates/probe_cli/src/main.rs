//! Entry point for the probe simulation.
//!
//! Headless by default; `--pipe` serves the line-oriented JSON command
//! protocol on stdin/stdout. All log output goes to stderr so pipe stdout
//! stays a pure JSON line stream.

mod headless;
mod pipe;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "probe_sim", about = "Deterministic galactic probe simulation")]
pub struct Args {
    /// Galaxy seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Run N ticks then exit (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    pub ticks: u64,

    /// Run without visualization (default).
    #[arg(long)]
    pub headless: bool,

    /// Enable visualization (not built into this binary; falls back to
    /// headless with a warning).
    #[arg(long, conflicts_with = "headless")]
    pub visual: bool,

    /// Serve the JSON command protocol on stdin/stdout.
    #[arg(long)]
    pub pipe: bool,

    /// Database file path.
    #[arg(long, default_value = "universe.db")]
    pub db: String,

    /// Save every N ticks.
    #[arg(long, default_value_t = 100)]
    pub save_interval: u64,

    /// Resume from the existing database instead of starting fresh.
    #[arg(long)]
    pub resume: bool,

    /// Target sim-years for a visual session (pacing hint).
    #[arg(long, default_value_t = 24.0)]
    pub sim_years: f64,

    /// Target real hours for a visual session (pacing hint).
    #[arg(long, default_value_t = 3.0)]
    pub hours: f64,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // clap renders --help/--version through the same path; those are
            // a normal exit.
            if err.use_stderr() {
                eprintln!("{err}");
                std::process::exit(1);
            }
            print!("{err}");
            std::process::exit(0);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let result = if args.pipe {
        pipe::run(&args)
    } else {
        headless::run(&args)
    };

    if let Err(err) = result {
        tracing::error!("fatal: {err:#}");
        std::process::exit(1);
    }
}
