//! JSON rendering of an origin/destination analysis.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "with_copy": [
//!     { "path": "/card/IMG_1.JPG", "twins": ["/archive/20240101/IMG_1.JPG"] }
//!   ],
//!   "without_copy": ["/card/IMG_2.JPG"],
//!   "could_not_compare": ["/card/IMG_3.JPG"],
//!   "unresolved": [
//!     {
//!       "origin": 3, "destination": 8,
//!       "origin_path": "/card/IMG_3.JPG", "destination_path": "/archive/x/IMG_3.JPG",
//!       "reason": "I/O error for /archive/x/IMG_3.JPG: ..."
//!     }
//!   ],
//!   "errors": ["Permission denied: /card/private"],
//!   "summary": {
//!     "origin_files": 3,
//!     "destination_files": 12,
//!     "candidate_pairs": 3,
//!     "twin_pairs": 1,
//!     "with_copy": 1,
//!     "without_copy": 1,
//!     "without_copy_bytes": 4300000,
//!     "without_copy_size": "4.3 MB",
//!     "could_not_compare": 1,
//!     "unresolved": 1,
//!     "interrupted": false,
//!     "exit_code": 3,
//!     "exit_code_name": "PC003"
//!   }
//! }
//! ```

use std::io::Write;

use bytesize::ByteSize;
use serde::Serialize;

use crate::diff::Analysis;
use crate::error::ExitCode;
use crate::matching::UnresolvedPair;

/// An origin file and the destinations confirmed identical to it.
#[derive(Debug, Clone, Serialize)]
pub struct JsonWithCopy {
    /// Origin path
    pub path: String,
    /// Twin paths in the destination tree
    pub twins: Vec<String>,
}

/// Summary counts in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Files found in the origin tree
    pub origin_files: usize,
    /// Files found in the destination tree
    pub destination_files: usize,
    /// Pairs accepted by the filter chain
    pub candidate_pairs: usize,
    /// Pairs confirmed identical
    pub twin_pairs: usize,
    /// Origin files with a copy
    pub with_copy: usize,
    /// Origin files without a copy
    pub without_copy: usize,
    /// Total size of the origin files without a copy
    pub without_copy_bytes: u64,
    /// The same, human readable
    pub without_copy_size: String,
    /// Origin files without a twin and with a failed comparison
    pub could_not_compare: usize,
    /// Pairs whose comparison failed
    pub unresolved: usize,
    /// Whether the analysis was interrupted
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "PC000")
    pub exit_code_name: String,
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Origin files with at least one twin
    pub with_copy: Vec<JsonWithCopy>,
    /// Origin files without a twin, every candidate compared
    pub without_copy: Vec<String>,
    /// Origin files whose copy status is unknown
    pub could_not_compare: Vec<String>,
    /// Candidate pairs left undecided
    pub unresolved: Vec<UnresolvedPair>,
    /// Walk and metadata errors
    pub errors: Vec<String>,
    /// Summary counts
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Build the output for an analysis and the exit code it maps to.
    #[must_use]
    pub fn new(analysis: &Analysis, exit_code: ExitCode) -> Self {
        let origins = analysis.origins();
        let destinations = analysis.destinations();
        let twins = analysis.twins();

        let with_copy: Vec<JsonWithCopy> = twins
            .with_links()
            .map(|i| JsonWithCopy {
                path: origins[i].path().to_string_lossy().into_owned(),
                twins: twins
                    .get(i)
                    .iter()
                    .map(|&d| destinations[d].path().to_string_lossy().into_owned())
                    .collect(),
            })
            .collect();
        let without_copy: Vec<String> = analysis
            .files_without_copy()
            .map(|f| f.path().to_string_lossy().into_owned())
            .collect();
        let without_copy_bytes: u64 = analysis
            .files_without_copy()
            .filter_map(|f| f.size().ok())
            .sum();
        let could_not_compare: Vec<String> = analysis
            .files_unresolved()
            .map(|f| f.path().to_string_lossy().into_owned())
            .collect();

        let summary = JsonSummary {
            origin_files: origins.len(),
            destination_files: destinations.len(),
            candidate_pairs: analysis.candidates().pair_count(),
            twin_pairs: twins.pair_count(),
            with_copy: with_copy.len(),
            without_copy: without_copy.len(),
            without_copy_bytes,
            without_copy_size: ByteSize(without_copy_bytes).to_string(),
            could_not_compare: could_not_compare.len(),
            unresolved: analysis.unresolved().len(),
            interrupted: analysis.interrupted(),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        };

        Self {
            with_copy,
            without_copy,
            could_not_compare,
            unresolved: analysis.unresolved().to_vec(),
            errors: analysis.errors().iter().map(ToString::to_string).collect(),
            summary,
        }
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

/// Write any serializable value as JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<T: Serialize + ?Sized, W: Write + ?Sized>(
    value: &T,
    writer: &mut W,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffSettings;
    use crate::scanner::{FileMeta, FileRef};

    fn file(path: &str, size: u64) -> FileRef {
        FileRef::with_metadata(
            path,
            FileMeta {
                size,
                modified: None,
                created: None,
            },
        )
    }

    #[test]
    fn test_json_output_without_twins() {
        let analysis = Analysis::from_files(
            vec![file("/card/a.jpg", 1_500_000), file("/card/b.jpg", 500_000)],
            vec![file("/arch/c.jpg", 10)],
            &DiffSettings::default().with_parallel(false),
        )
        .unwrap();

        let output = JsonOutput::new(&analysis, ExitCode::Success);
        assert!(output.with_copy.is_empty());
        assert_eq!(output.without_copy, vec!["/card/a.jpg", "/card/b.jpg"]);
        assert_eq!(output.summary.without_copy_bytes, 2_000_000);
        assert!(output.could_not_compare.is_empty());
        assert_eq!(output.summary.exit_code_name, "PC000");

        let mut buf = Vec::new();
        output.write_to(&mut buf, false).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["summary"]["origin_files"], 2);
        assert_eq!(value["summary"]["destination_files"], 1);
        assert!(buf.ends_with(b"\n"));
    }

    #[test]
    fn test_json_output_separates_could_not_compare() {
        // Metadata only: reading either file fails, so the pair stays undecided.
        let analysis = Analysis::from_files(
            vec![file("/card/a.jpg", 10), file("/card/b.jpg", 20)],
            vec![file("/arch/a.jpg", 10)],
            &DiffSettings::default().with_parallel(false),
        )
        .unwrap();

        let output = JsonOutput::new(&analysis, ExitCode::PartialSuccess);
        assert_eq!(output.without_copy, vec!["/card/b.jpg"]);
        assert_eq!(output.could_not_compare, vec!["/card/a.jpg"]);
        assert_eq!(output.summary.could_not_compare, 1);
        assert_eq!(output.summary.unresolved, 1);
        assert_eq!(output.summary.without_copy_bytes, 20);
    }

    #[test]
    fn test_write_json_pretty() {
        let mut buf = Vec::new();
        write_json(&serde_json::json!({"a": 1}), &mut buf, true).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains('\n'));
    }
}
