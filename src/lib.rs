//! photoclassify - date-bucketed photo archiving
//!
//! Copies photographs from a card or staging tree into per-day archive
//! directories without ever overwriting a file or storing the same content
//! twice under one name, and reports which origin files already have a
//! byte-identical copy in the archive.

pub mod catalog;
pub mod cli;
pub mod compare;
pub mod config;
pub mod copy;
pub mod diff;
pub mod error;
pub mod logging;
pub mod matching;
pub mod naming;
pub mod output;
pub mod placer;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::catalog::{Catalog, Listing};
use crate::cli::{
    CatalogArgs, CatalogCommand, Cli, Commands, ConfigCommand, DiffArgs, HistArgs, ListingFormat,
    MatchArgs, OutputFormat, ReportArgs,
};
use crate::config::Config;
use crate::copy::{copy_photographs, CopyOptions};
use crate::diff::{write_report, Analysis, DiffSettings, SizeHistogram};
use crate::error::ExitCode;
use crate::output::{write_json, HistogramCsv, JsonOutput, ListingCsv};
use crate::progress::{Progress, ProgressCallback};
use crate::signal::ShutdownHandler;

/// Execute a parsed command line.
///
/// # Errors
///
/// Returns an error for invalid configuration, unreadable roots, catalog
/// failures, or output that cannot be written. Per-file failures are not
/// errors; they map to [`ExitCode::PartialSuccess`].
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    if let Commands::Config(args) = &cli.command {
        return show_config(&config, args.command);
    }

    let handler = signal::install_handler().context("installing the Ctrl+C handler")?;
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(cli.quiet));

    match cli.command {
        Commands::Copy(args) => {
            config.merge_copy_args(&args);
            config.validate()?;
            config.require_paths()?;
            let options = CopyOptions::default()
                .with_shutdown_flag(handler.get_flag())
                .with_progress_callback(progress);
            let mut out = open_output(args.output.as_deref())?;
            let result = copy_photographs(&config, &options, &mut out)?;
            out.flush()?;

            Ok(if result.interrupted {
                ExitCode::Interrupted
            } else if result.has_failures() {
                ExitCode::PartialSuccess
            } else {
                ExitCode::Success
            })
        }
        Commands::Diff(args) => run_diff(&mut config, &args, &handler, progress),
        Commands::Report(args) => run_report(&mut config, &args, &handler, progress),
        Commands::Hist(args) => run_hist(&mut config, &args, &handler, progress),
        Commands::Catalog(args) => run_catalog(&config, &args),
        Commands::Config(_) => Ok(ExitCode::Success),
    }
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn analyze(
    config: &mut Config,
    args: &MatchArgs,
    handler: &ShutdownHandler,
    progress: Arc<dyn ProgressCallback>,
) -> anyhow::Result<Analysis> {
    config.merge_match_args(args);
    config.validate()?;
    let (origin, destination) = config.require_paths()?;
    let settings = DiffSettings::from_config(config)
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(progress);
    Ok(Analysis::run(origin, destination, &settings)?)
}

fn analysis_exit_code(analysis: &Analysis) -> ExitCode {
    if analysis.interrupted() {
        ExitCode::Interrupted
    } else if !analysis.unresolved().is_empty() || !analysis.errors().is_empty() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    }
}

fn run_diff(
    config: &mut Config,
    args: &DiffArgs,
    handler: &ShutdownHandler,
    progress: Arc<dyn ProgressCallback>,
) -> anyhow::Result<ExitCode> {
    let analysis = analyze(config, &args.matching, handler, progress)?;
    let code = analysis_exit_code(&analysis);
    let mut out = open_output(args.output.as_deref())?;

    match args.format {
        OutputFormat::Json => JsonOutput::new(&analysis, code).write_to(&mut out, true)?,
        OutputFormat::Text => {
            let (origin, destination) = config.require_paths()?;
            let missing: Vec<_> = analysis.files_without_copy().collect();
            let unknown: Vec<_> = analysis.files_unresolved().collect();
            if missing.is_empty() && unknown.is_empty() {
                writeln!(
                    out,
                    "All elements in '{}' have a copy in '{}'.",
                    origin.display(),
                    destination.display()
                )?;
            } else if !missing.is_empty() {
                writeln!(out, "Don't have a copy:")?;
                for file in missing {
                    writeln!(out, "{}", file.path().display())?;
                }
            }
            if !unknown.is_empty() {
                writeln!(out, "Could not compare:")?;
                for file in unknown {
                    writeln!(out, "{}", file.path().display())?;
                }
            }
            for pair in analysis.unresolved() {
                log::warn!(
                    "Could not compare {} with {}: {}",
                    pair.origin_path.display(),
                    pair.destination_path.display(),
                    pair.reason
                );
            }
        }
    }
    out.flush()?;
    Ok(code)
}

fn run_report(
    config: &mut Config,
    args: &ReportArgs,
    handler: &ShutdownHandler,
    progress: Arc<dyn ProgressCallback>,
) -> anyhow::Result<ExitCode> {
    let analysis = analyze(config, &args.matching, handler, progress)?;
    let mut out = open_output(args.output.as_deref())?;
    write_report(
        &analysis,
        args.sections,
        !args.no_numbers,
        args.level_two,
        &mut out,
    )?;
    out.flush()?;
    Ok(analysis_exit_code(&analysis))
}

fn run_hist(
    config: &mut Config,
    args: &HistArgs,
    handler: &ShutdownHandler,
    progress: Arc<dyn ProgressCallback>,
) -> anyhow::Result<ExitCode> {
    let analysis = analyze(config, &args.matching, handler, progress)?;
    let histogram = SizeHistogram::build(
        &analysis,
        args.nbins,
        !args.no_split_input,
        !args.no_filter_output,
    );
    let mut out = open_output(args.output.as_deref())?;
    HistogramCsv::new(&histogram).write_to(&mut out)?;
    out.flush()?;
    Ok(analysis_exit_code(&analysis))
}

fn run_catalog(config: &Config, args: &CatalogArgs) -> anyhow::Result<ExitCode> {
    let path = match &args.db {
        Some(path) => path.clone(),
        None => config.catalog_path()?,
    };
    let mut catalog = Catalog::open(&path)
        .with_context(|| format!("opening catalog {}", path.display()))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &args.command {
        CatalogCommand::Import { paths, max_workers } => {
            let summary = catalog.import_paths(paths, *max_workers)?;
            writeln!(
                out,
                "Found {} files: {} already known, {} added, {} failed",
                summary.found, summary.known, summary.added, summary.failed
            )?;
            if summary.failed > 0 {
                return Ok(ExitCode::PartialSuccess);
            }
        }
        CatalogCommand::Tag { path, tag } => {
            catalog.tag_directory(path, tag)?;
            log::info!("Tagged {} as {}", path.display(), tag.to_uppercase());
        }
        CatalogCommand::Duplicates { flat } => {
            let listing = catalog.duplicates(!flat)?;
            write_listing(&listing, args.format, &mut out)?;
        }
        CatalogCommand::Idle {
            flat,
            include_singletons,
        } => {
            let (listing, warning) = catalog.idle(!flat, *include_singletons)?;
            if let Some(warning) = warning {
                eprintln!("Warning: {warning}");
            }
            write_listing(&listing, args.format, &mut out)?;
        }
        CatalogCommand::Find { query } => match catalog.find(query)? {
            Some(found) => writeln!(out, "{}", found.display())?,
            None => {
                eprintln!("No catalogued file matches '{query}'");
                return Ok(ExitCode::GeneralError);
            }
        },
    }
    Ok(ExitCode::Success)
}

fn write_listing(listing: &Listing, format: ListingFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    match format {
        ListingFormat::Json => write_json(listing, out, true)?,
        ListingFormat::Csv => ListingCsv::new(listing).write_to(out)?,
        ListingFormat::Text => match listing {
            Listing::Grouped(groups) => {
                for group in groups {
                    writeln!(out, "{}:", group.hash)?;
                    for path in &group.paths {
                        writeln!(out, "\t{}", path.display())?;
                    }
                }
            }
            Listing::Flat(paths) => {
                for path in paths {
                    writeln!(out, "{}", path.display())?;
                }
            }
        },
    }
    Ok(())
}

fn show_config(config: &Config, command: ConfigCommand) -> anyhow::Result<ExitCode> {
    match command {
        ConfigCommand::Show => print!("{}", config.to_toml()?),
        ConfigCommand::Path => match Config::default_config_path() {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("no configuration directory on this platform"),
        },
    }
    Ok(ExitCode::Success)
}
