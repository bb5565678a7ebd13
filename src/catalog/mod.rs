//! Persistent catalog of file hashes and tagged directories.
//!
//! The catalog records a BLAKE3 hash per file and a tag per directory. Two
//! queries run over it:
//!
//! - [`find_duplicates`]: groups of files sharing a hash
//! - [`find_idle`]: groups with no member under an `ARCHIVE` directory
//!
//! Both are pure functions over [`HashRecord`]s; [`Catalog`] loads the
//! records from SQLite and forwards.
//!
//! # Example
//!
//! ```no_run
//! use photoclassify::catalog::Catalog;
//! use std::path::{Path, PathBuf};
//!
//! let mut catalog = Catalog::open(Path::new("catalog.db")).unwrap();
//! catalog.import_paths(&[PathBuf::from("/home/me/Pictures")], None).unwrap();
//! catalog.tag_directory(Path::new("/srv/archive"), "archive").unwrap();
//! let (idle, _warning) = catalog.idle(true, false).unwrap();
//! println!("{} idle groups", idle.len());
//! ```

pub mod index;
mod store;

use std::path::PathBuf;

pub use index::{find_duplicates, find_idle, DuplicateGroup, HashRecord, IndexWarning, Listing};
pub use store::{hash_file, Catalog, ImportSummary};

/// Tag marking authoritative long-term storage.
pub const ARCHIVE_TAG: &str = "ARCHIVE";

/// Errors raised by the catalog.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The database reported an error.
    #[error("Catalog database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database location could not be prepared.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The hashing pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[source] rayon::ThreadPoolBuildError),

    /// A lookup matched several files and none stands out as archived.
    #[error("'{identifier}' matches {matches} files, be more specific")]
    Ambiguous {
        /// The lookup text
        identifier: String,
        /// Number of matches
        matches: usize,
    },
}
