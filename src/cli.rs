//! Command-line interface definitions for photoclassify.
//!
//! Every subcommand's flags override the layered configuration (see
//! [`crate::config`]); anything left unset falls back to the TOML file,
//! `PHOTOCLASSIFY_*` variables, or the built-in defaults.
//!
//! # Example
//!
//! ```bash
//! # Copy a memory card into the archive, bucketed by quarter
//! photoclassify copy /media/card/DCIM /srv/photos --quarters
//!
//! # List the card files that have no byte-identical copy in the archive
//! photoclassify diff /media/card/DCIM /srv/photos
//!
//! # Same, matching on size only and streaming the comparison
//! photoclassify diff /media/card/DCIM /srv/photos --filter size --strategy stream
//!
//! # Catalog queries
//! photoclassify catalog import ~/Pictures
//! photoclassify catalog tag /srv/photos
//! photoclassify catalog idle
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::compare::CompareStrategy;
use crate::diff::ReportSections;
use crate::diff::histogram::DEFAULT_BINS;
use crate::matching::FilterChain;

/// Archive photographs by date without ever overwriting or duplicating.
///
/// photoclassify copies photographs into per-day directories, renames on
/// name collisions, and reports which files already have a byte-identical
/// copy elsewhere.
#[derive(Debug, Parser)]
#[command(name = "photoclassify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Copy photographs into date-named directories
    Copy(CopyArgs),
    /// List origin files without a byte-identical copy in the destination
    Diff(DiffArgs),
    /// Write the candidate/twin report
    Report(ReportArgs),
    /// Export file-size histogram data as CSV
    Hist(HistArgs),
    /// Query the persistent hash catalog
    Catalog(CatalogArgs),
    /// Inspect the effective configuration
    Config(ConfigArgs),
}

/// Origin and destination trees.
#[derive(Debug, Clone, Default, Args)]
pub struct TreeArgs {
    /// Tree to read photographs from
    #[arg(value_name = "ORIGIN")]
    pub origin: Option<PathBuf>,

    /// Archive tree
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<PathBuf>,
}

/// Worker pool flags.
#[derive(Debug, Clone, Default, Args)]
pub struct WorkerArgs {
    /// Process files one at a time
    #[arg(short = 'P', long)]
    pub no_parallel: bool,

    /// Upper bound on worker threads (default: available parallelism)
    #[arg(short = 'W', long, value_name = "N", value_parser = clap::value_parser!(usize))]
    pub max_workers: Option<usize>,
}

/// Arguments for the copy subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct CopyArgs {
    #[command(flatten)]
    pub trees: TreeArgs,

    /// Insert a YYYYQn level above the day directories
    #[arg(long)]
    pub quarters: bool,

    /// Hours after midnight at which a new day starts (0-11)
    #[arg(short = 'H', long, value_name = "HOURS")]
    pub day_starts_at: Option<u32>,

    /// Ignore files older than this date (DD-MM-YYYY)
    #[arg(short = 'a', long, value_name = "DATE")]
    pub process_after: Option<String>,

    /// Do not include the first day itself
    #[arg(short = 'F', long)]
    pub no_include_first: bool,

    /// Start from the last processed date and record it afterwards
    #[arg(long)]
    pub auto_date: bool,

    /// Report verbosity (1 summary, 2 counts, 3 listings and errors)
    #[arg(short = 'r', long, value_name = "LEVEL")]
    pub report_level: Option<u8>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Delete origin files once their copy is verified
    #[arg(long)]
    pub remove: bool,

    /// Content comparison used on name collisions
    #[arg(long, value_enum)]
    pub strategy: Option<CompareStrategy>,

    #[command(flatten)]
    pub workers: WorkerArgs,
}

/// Matching flags shared by diff, report and hist.
#[derive(Debug, Clone, Default, Args)]
pub struct MatchArgs {
    #[command(flatten)]
    pub trees: TreeArgs,

    /// Candidate filters, comma separated (name, size)
    #[arg(short, long, value_name = "FILTERS")]
    pub filter: Option<FilterChain>,

    /// Content comparison strategy
    #[arg(long, value_enum)]
    pub strategy: Option<CompareStrategy>,

    #[command(flatten)]
    pub workers: WorkerArgs,
}

/// Arguments for the diff subcommand.
#[derive(Debug, Clone, Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub matching: MatchArgs,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the report subcommand.
#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub matching: MatchArgs,

    /// Relations to report
    #[arg(short, long, value_enum, default_value = "twins")]
    pub sections: ReportSections,

    /// Omit entry numbers
    #[arg(long)]
    pub no_numbers: bool,

    /// List related destination paths beneath each entry
    #[arg(short = 'l', long)]
    pub level_two: bool,

    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the hist subcommand.
#[derive(Debug, Clone, Args)]
pub struct HistArgs {
    #[command(flatten)]
    pub matching: MatchArgs,

    /// Number of bins
    #[arg(short = 'b', long, value_name = "N", default_value_t = DEFAULT_BINS)]
    pub nbins: usize,

    /// One series for all origin files instead of twins / no twins
    #[arg(short = 'S', long)]
    pub no_split_input: bool,

    /// Also count destination files unrelated to any origin file
    #[arg(short = 'F', long)]
    pub no_filter_output: bool,

    /// Write the CSV to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the catalog subcommand.
#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    /// Catalog database (defaults to the platform data directory)
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Output format for listings
    #[arg(long, value_enum, default_value = "text")]
    pub format: ListingFormat,

    #[command(subcommand)]
    pub command: CatalogCommand,
}

/// Catalog operations.
#[derive(Debug, Clone, Subcommand)]
pub enum CatalogCommand {
    /// Hash every new file under the given directories
    Import {
        /// Directories to import
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Upper bound on hashing threads
        #[arg(short = 'W', long, value_name = "N")]
        max_workers: Option<usize>,
    },
    /// Tag a directory (e.g. archive)
    Tag {
        /// Directory to tag
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Tag name, stored upper-case
        #[arg(short, long, default_value = "archive")]
        tag: String,
    },
    /// Files sharing a hash
    Duplicates {
        /// One path per line instead of groups
        #[arg(long)]
        flat: bool,
    },
    /// Duplicate groups with no member in an archive directory
    Idle {
        /// One path per line instead of groups
        #[arg(long)]
        flat: bool,

        /// Also report files without any duplicate
        #[arg(long)]
        include_singletons: bool,
    },
    /// Look up a file by path fragment or hash prefix
    Find {
        /// Path fragment or hash prefix
        #[arg(value_name = "QUERY")]
        query: String,
    },
}

/// Arguments for the config subcommand.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config operations.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigCommand {
    /// Print the merged configuration as TOML
    Show,
    /// Print the default configuration file location
    Path,
}

/// Output format for diff results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing
    Text,
    /// JSON for scripting
    Json,
}

/// Output format for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListingFormat {
    /// Human-readable listing
    Text,
    /// JSON for scripting
    Json,
    /// CSV for spreadsheets
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
