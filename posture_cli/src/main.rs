mod cli;
mod csv_log;
mod error_fmt;
mod session;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use posture_config::Config;
use posture_core::{PostureError, StatusRecord};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::session::MonitorOpts;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("warning: failed to install error hooks: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            if json_mode() {
                println!("{}", format_error_json(&err));
            } else {
                eprintln!("{}", humanize(&err));
            }
            ExitCode::from(exit_code_for_error(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;

    match cli.cmd {
        Commands::Monitor {
            cycles,
            replay,
            mount,
            recalibrate_file,
            csv,
            summary,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || {
                flag.store(true, Ordering::Relaxed);
            })
            .wrap_err("install Ctrl-C handler")?;

            let opts = MonitorOpts {
                cycles,
                replay,
                mount,
                recalibrate_file,
                csv,
                json: cli.json,
            };
            let result = session::run_monitor(&cfg, opts, shutdown)?;
            if summary {
                session::print_summary(&result, cli.json);
            }
        }
        Commands::Calibrate => {
            let offset = session::run_calibrate(&cfg)?;
            if cli.json {
                println!("{}", serde_json::to_string(&StatusRecord::from(offset))?);
            } else {
                println!(
                    "Calibrated: pitch offset {:.2}°, roll offset {:.2}°",
                    offset.pitch_offset_deg, offset.roll_offset_deg
                );
            }
        }
        Commands::SelfCheck => {
            let reading = session::self_check(&cfg)?;
            tracing::debug!(?reading, "self-check sample");
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "status": "ok", "backend": session::backend_name() })
                );
            } else {
                println!("OK ({} backend: sensor and buzzer respond)", session::backend_name());
            }
        }
        Commands::Health => {
            let v = serde_json::json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "backend": session::backend_name(),
                "config": cli.config.display().to_string(),
                "period_ms": cfg.runner.period_ms,
                "threshold_deg": cfg.posture.threshold_deg,
            });
            println!("{v}");
        }
    }
    Ok(())
}

/// Missing file → built-in defaults; anything unreadable or invalid is an error.
fn load_config(path: &Path) -> Result<Config> {
    let cfg = if path.exists() {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("read config {}", path.display()))?;
        posture_config::load_toml(&text)
            .map_err(|e| PostureError::Config(format!("{}: {e}", path.display())))
            .wrap_err("parse config")?
    } else {
        Config::default()
    };
    cfg.validate()
        .map_err(|e| PostureError::Config(format!("{e:#}")))?;
    Ok(cfg)
}

fn init_tracing(json: bool, level: &str, logging: &posture_config::Logging) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid --log-level {level:?}"))?;
    // Console logs always go to stderr; stdout is reserved for command output.
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| PostureError::Config(format!("logging.file {file:?} has no file name")))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
                .wrap_err("invalid logging.level")?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")
}
