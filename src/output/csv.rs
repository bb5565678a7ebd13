//! CSV rendering of histogram data and catalog listings.
//!
//! # Histogram columns
//!
//! - `bin_start_mb`, `bin_end_mb`: bin edges in megabytes
//! - one count column per series, e.g. `input_twins`, `input_no_twins`,
//!   `output_twins`, `output_unrelated`
//!
//! # Listing columns
//!
//! - `group_id`: 1-based group number (empty for flat listings)
//! - `hash`: shared content hash (empty for flat listings)
//! - `path`: file path

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::Listing;
use crate::diff::SizeHistogram;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Histogram as one row per bin.
pub struct HistogramCsv<'a> {
    histogram: &'a SizeHistogram,
}

impl<'a> HistogramCsv<'a> {
    /// Create a new CSV formatter.
    #[must_use]
    pub fn new(histogram: &'a SizeHistogram) -> Self {
        Self { histogram }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec!["bin_start_mb".to_string(), "bin_end_mb".to_string()];
        header.extend(self.histogram.series().map(|s| s.label.clone()));
        csv_writer.write_record(&header)?;

        let edges = &self.histogram.edges;
        for bin in 0..self.histogram.bins() {
            let mut record = vec![format!("{:.6}", edges[bin]), format!("{:.6}", edges[bin + 1])];
            record.extend(self.histogram.series().map(|s| s.counts[bin].to_string()));
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

#[derive(Debug, Serialize)]
struct ListingRow<'a> {
    group_id: Option<usize>,
    hash: Option<&'a str>,
    path: String,
}

/// Catalog query result as one row per path.
pub struct ListingCsv<'a> {
    listing: &'a Listing,
}

impl<'a> ListingCsv<'a> {
    /// Create a new CSV formatter.
    #[must_use]
    pub fn new(listing: &'a Listing) -> Self {
        Self { listing }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        match self.listing {
            Listing::Grouped(groups) => {
                for (idx, group) in groups.iter().enumerate() {
                    for path in &group.paths {
                        csv_writer.serialize(ListingRow {
                            group_id: Some(idx + 1),
                            hash: Some(&group.hash),
                            path: path.to_string_lossy().into_owned(),
                        })?;
                    }
                }
            }
            Listing::Flat(paths) => {
                for path in paths {
                    csv_writer.serialize(ListingRow {
                        group_id: None,
                        hash: None,
                        path: path.to_string_lossy().into_owned(),
                    })?;
                }
            }
        }
        csv_writer.flush()?;
        Ok(())
    }
}
