//! Machine-readable output.
//!
//! - JSON for analyses, copy results and catalog queries
//! - CSV for histogram data and catalog listings
//!
//! # Example
//!
//! ```no_run
//! use photoclassify::diff::{Analysis, DiffSettings};
//! use photoclassify::error::ExitCode;
//! use photoclassify::output::JsonOutput;
//! use std::path::Path;
//!
//! let analysis =
//!     Analysis::run(Path::new("/card"), Path::new("/archive"), &DiffSettings::default()).unwrap();
//! let output = JsonOutput::new(&analysis, ExitCode::Success);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod csv;
pub mod json;

pub use csv::{CsvOutputError, HistogramCsv, ListingCsv};
pub use json::{write_json, JsonOutput, JsonOutputError};
