//! Integration tests for layered configuration.
//!
//! These tests verify the full configuration stack: defaults, TOML file
//! parsing, environment variable overrides, CLI flag overrides, and
//! validation.

use clap::Parser;
use photoclassify::cli::{Cli, Commands};
use photoclassify::compare::CompareStrategy;
use photoclassify::config::{Config, ConfigError};
use photoclassify::matching::{Filter, FilterChain};
use std::fs;
use std::sync::Mutex;
use tempfile::tempdir;

// =============================================================================
// Helper Functions
// =============================================================================

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clear all PHOTOCLASSIFY_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("PHOTOCLASSIFY_") {
            std::env::remove_var(key);
        }
    }
}

fn lock() -> std::sync::MutexGuard<'static, ()> {
    let guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    guard
}

const SAMPLE: &str = r#"
[path]
origin = "/media/card"
destination = "/srv/photos"
quarters = true

[date]
day_starts_at = 4
process_after = "15-03-2024"

[copy]
verbose = 3
max_rename_attempts = 5

[matching]
filters = ["name", "size"]
strategy = "stream"
chunk_size = 65536
"#;

// =============================================================================
// Layering
// =============================================================================

#[test]
fn test_config_defaults() {
    let _lock = lock();
    let config = Config::default();
    assert_eq!(config.date.day_starts_at, 0);
    assert_eq!(config.copy.verbose, 2);
    assert_eq!(config.copy.max_rename_attempts, 20);
    assert_eq!(config.matching.chunk_size, 8192);
    assert_eq!(config.matching.strategy, CompareStrategy::Hash);
    assert_eq!(
        config.matching.filters,
        FilterChain::new(vec![Filter::Name, Filter::Size])
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_load_from_toml() {
    let _lock = lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, SAMPLE).unwrap();

    let config = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.path.origin.as_deref(), Some(std::path::Path::new("/media/card")));
    assert!(config.path.quarters);
    assert_eq!(config.date.day_starts_at, 4);
    assert_eq!(config.copy.verbose, 3);
    assert_eq!(config.copy.max_rename_attempts, 5);
    assert_eq!(
        config.matching.filters,
        FilterChain::new(vec![Filter::Name, Filter::Size])
    );
    assert_eq!(config.matching.strategy, CompareStrategy::Stream);
    // Untouched sections keep their defaults
    assert!(config.date.include_first);
    assert!(config.copy.parallel);
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let _lock = lock();
    let dir = tempdir().unwrap();
    let config = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_env_overrides_file() {
    let _lock = lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, SAMPLE).unwrap();

    std::env::set_var("PHOTOCLASSIFY_MATCHING__CHUNK_SIZE", "4096");
    std::env::set_var("PHOTOCLASSIFY_DATE__DAY_STARTS_AT", "6");
    let config = Config::load(Some(path.as_path()));
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.matching.chunk_size, 4096);
    assert_eq!(config.date.day_starts_at, 6);
    assert_eq!(config.copy.verbose, 3);
}

#[test]
fn test_invalid_toml_value_is_load_error() {
    let _lock = lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[matching]\nstrategy = \"telepathy\"\n").unwrap();

    assert!(matches!(Config::load(Some(path.as_path())), Err(ConfigError::Load(_))));
}

#[test]
fn test_cli_overrides_file_and_env() {
    let _lock = lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, SAMPLE).unwrap();
    std::env::set_var("PHOTOCLASSIFY_COPY__VERBOSE", "1");
    let loaded = Config::load(Some(path.as_path()));
    clear_env();
    let mut config = loaded.unwrap();
    assert_eq!(config.copy.verbose, 1);

    let cli = Cli::try_parse_from([
        "photoclassify",
        "copy",
        "/other/card",
        "--report-level",
        "2",
        "-H",
        "0",
        "-P",
        "--strategy",
        "hash",
    ])
    .unwrap();
    let Commands::Copy(args) = cli.command else {
        panic!("Expected Copy command");
    };
    config.merge_copy_args(&args);

    assert_eq!(config.path.origin.as_deref(), Some(std::path::Path::new("/other/card")));
    // Destination not given on the command line: the file's value stays
    assert_eq!(config.path.destination.as_deref(), Some(std::path::Path::new("/srv/photos")));
    assert_eq!(config.copy.verbose, 2);
    assert_eq!(config.date.day_starts_at, 0);
    assert!(!config.copy.parallel);
    assert_eq!(config.matching.strategy, CompareStrategy::Hash);
    // Flags not given keep the file's values
    assert!(config.path.quarters);
}

#[test]
fn test_match_args_override_filters() {
    let _lock = lock();
    let mut config = Config::default();
    let cli = Cli::try_parse_from([
        "photoclassify",
        "diff",
        "/a",
        "/b",
        "--filter",
        "size,modified",
        "-W",
        "3",
    ])
    .unwrap();
    let Commands::Diff(args) = cli.command else {
        panic!("Expected Diff command");
    };
    config.merge_match_args(&args.matching);

    assert_eq!(
        config.matching.filters,
        FilterChain::new(vec![Filter::Size, Filter::Modified])
    );
    assert_eq!(config.matching.max_workers, Some(3));
    assert_eq!(config.require_paths().unwrap().1, std::path::Path::new("/b"));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validation_failures_from_file() {
    let _lock = lock();
    let dir = tempdir().unwrap();
    let cases = [
        ("[date]\nday_starts_at = 12\n", "day_starts_at"),
        ("[date]\nprocess_after = \"2024-01-01\"\n", "DD-MM-YYYY"),
        ("[matching]\nfilters = []\n", "filter"),
        ("[copy]\nmax_rename_attempts = 0\n", "max_rename_attempts"),
    ];
    for (toml, needle) in cases {
        let path = dir.path().join("config.toml");
        fs::write(&path, toml).unwrap();
        let config = Config::load(Some(path.as_path())).unwrap();
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains(needle),
            "'{err}' should mention '{needle}'"
        );
    }
}

#[test]
fn test_render_round_trips_through_file() {
    let _lock = lock();
    let dir = tempdir().unwrap();
    let source = dir.path().join("source.toml");
    fs::write(&source, SAMPLE).unwrap();
    let config = Config::load(Some(source.as_path())).unwrap();

    let rendered = dir.path().join("rendered.toml");
    fs::write(&rendered, config.to_toml().unwrap()).unwrap();
    assert_eq!(Config::load_from_path(&rendered).unwrap(), config);
}
