//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (stdout then carries JSONL only).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "posture", version, about = "Wearable posture monitor")]
pub struct Cli {
    /// Path to config TOML (typed); a missing file means built-in defaults
    #[arg(long, value_name = "FILE", default_value = "etc/posture_config.toml")]
    pub config: PathBuf,

    /// Emit JSON lines on stdout; logs move to stderr
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Override for `[sensor] mount`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MountArg {
    Neck,
    Hat,
}

impl From<MountArg> for posture_core::Mount {
    fn from(m: MountArg) -> Self {
        match m {
            MountArg::Neck => posture_core::Mount::Neck,
            MountArg::Hat => posture_core::Mount::Hat,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calibrate, then monitor posture until Ctrl-C (or --cycles)
    Monitor {
        /// Stop after this many cycles
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Drive the monitor from a recorded session (ax,ay,az,gx,gy,gz CSV)
        #[arg(long, value_name = "FILE")]
        replay: Option<PathBuf>,
        /// Override the configured sensor mount
        #[arg(long, value_enum)]
        mount: Option<MountArg>,
        /// Recalibrate whenever this file appears (it is removed afterwards)
        #[arg(
            long,
            value_name = "FILE",
            long_help = "Poll for this path at the start of every cycle. When it exists the monitor re-runs calibration with the wearer's current posture as the new neutral, then deletes the file. Example: `touch /run/posture/recalibrate`."
        )]
        recalibrate_file: Option<PathBuf>,
        /// Append every cycle to this CSV log (header written once)
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
        /// Print a summary on completion
        #[arg(long, action = ArgAction::SetTrue)]
        summary: bool,
    },
    /// Measure the neutral posture once and print the offsets
    Calibrate,
    /// Quick health check (sensor and buzzer respond)
    SelfCheck,
    /// Health check for operational monitoring
    Health,
}
