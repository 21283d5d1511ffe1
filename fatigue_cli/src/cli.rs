//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "fatigue-monitor", version, about = "Pilot fatigue fusion engine")]
pub struct Cli {
    /// Path to config TOML; built-in defaults are used when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fusion engine against the data store
    Monitor {
        /// Stop after this many seconds (runs until ctrl-c when omitted)
        #[arg(long, value_name = "SECONDS")]
        duration_s: Option<u64>,
        /// Print evaluation counters on exit
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Replay a scripted drowsiness scenario through the real engine
    Simulate {
        /// Number of simulated ticks
        #[arg(long, default_value_t = 120)]
        ticks: u32,
        /// Simulated seconds per tick
        #[arg(long, default_value_t = 0.1)]
        tick_s: f64,
    },
    /// Quick engine and store round-trip check
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
