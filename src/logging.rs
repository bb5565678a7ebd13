//! Logging setup for photoclassify.
//!
//! Diagnostics go through the `log` facade with an `env_logger` backend.
//! The level is chosen as follows:
//!
//! 1. `RUST_LOG`, when set, wins outright
//! 2. `--quiet` drops everything below errors
//! 3. `-v` enables debug, `-vv` enables trace
//! 4. otherwise info
//!
//! Copy reports and diff listings are program output and are written to
//! stdout or the `--output` file, never through the logger.
//!
//! # Example
//!
//! ```rust,no_run
//! use photoclassify::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("walking origin tree");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize the global logger from CLI verbosity flags.
///
/// Must be called at most once per process; `env_logger` refuses a second
/// initialization, so later calls are ignored.
///
/// # Arguments
///
/// * `verbose` - Count of `-v` flags (0=info, 1=debug, 2+=trace)
/// * `quiet` - Only report errors (ignored when `RUST_LOG` is set)
pub fn init_logging(verbose: u8, quiet: bool) {
    let from_env = env::var_os("RUST_LOG").is_some();
    let mut builder = Builder::new();

    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level_for(verbose, quiet));
    }

    apply_format(&mut builder, verbose);

    if builder.try_init().is_err() {
        return;
    }

    if from_env {
        log::debug!("Log level taken from RUST_LOG");
    } else {
        log::debug!("Log level set to {:?}", level_for(verbose, quiet));
    }
}

/// Map the `-v`/`-q` flags onto a level filter.
fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Debug builds carry a timestamp and, from `-v` on, the module path.
/// Release builds print the level and message only.
fn apply_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            let timestamp = buf.timestamp_seconds();
            if verbose >= 1 {
                writeln!(
                    buf,
                    "{timestamp} {style}{level:<5}{style:#} [{}] {}",
                    record.module_path().unwrap_or("?"),
                    record.args()
                )
            } else {
                writeln!(buf, "{timestamp} {style}{level:<5}{style:#} {}", record.args())
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{level:<5}{style:#} {}", record.args())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_default_is_info() {
        assert_eq!(level_for(0, false), LevelFilter::Info);
    }

    #[test]
    fn test_level_verbose_steps() {
        assert_eq!(level_for(1, false), LevelFilter::Debug);
        assert_eq!(level_for(2, false), LevelFilter::Trace);
        assert_eq!(level_for(7, false), LevelFilter::Trace);
    }

    #[test]
    fn test_quiet_beats_verbose() {
        assert_eq!(level_for(0, true), LevelFilter::Error);
        assert_eq!(level_for(2, true), LevelFilter::Error);
    }

    #[test]
    fn test_double_init_is_harmless() {
        init_logging(0, true);
        init_logging(2, false);
    }
}
