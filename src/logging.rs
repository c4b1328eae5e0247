//! Logging setup for halocache consumers.
//!
//! The library itself only emits records through the `log` facade: cache
//! mutations at info level, duplicate adds and dropped log lines at warn
//! level, file I/O at debug/trace level. Applications that do not install
//! their own logger can call [`init_logging`] to get an `env_logger` backend.
//!
//! Log levels are determined by (in priority order):
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. `quiet` (error only) or `verbose` (debug/trace)
//! 3. Default: info level
//!
//! # Example
//!
//! ```rust,no_run
//! use halocache::logging::init_logging;
//!
//! // Debug output for cache operations
//! init_logging(1, false);
//!
//! log::info!("Scanning for halo catalogs");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Install an `env_logger` backend.
///
/// Calling this more than once, or after another logger was installed, is
/// harmless: later calls leave the existing logger in place.
///
/// # Arguments
///
/// * `verbose` - Verbosity count (0=info, 1=debug, 2+=trace)
/// * `quiet` - If true, only show errors (overridden by RUST_LOG)
pub fn init_logging(verbose: u8, quiet: bool) {
    let use_env = env::var("RUST_LOG").is_ok();

    let mut builder = Builder::new();
    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(move |buf, record| {
        let level = record.level();
        let level_style = buf.default_level_style(level);
        if verbose >= 1 {
            writeln!(
                buf,
                "{} {level_style}{:<5}{level_style:#} [{}] {}",
                buf.timestamp_seconds(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{level_style}{:<5}{level_style:#} {}",
                level,
                record.args()
            )
        }
    });

    match builder.try_init() {
        Ok(()) => log::debug!("Logging initialized at level: {:?}", log::max_level()),
        Err(e) => log::debug!("Logger already installed, keeping it: {}", e),
    }
}

/// Determine the log level from the verbosity flags.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Get the current log level as a string.
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
