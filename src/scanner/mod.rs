//! File discovery and file references.
//!
//! This module provides:
//! - [`FileRef`]: an immutable path with lazily queried, cached metadata
//! - [`Walker`]: full recursive enumeration of a tree using jwalk
//! - [`dating`]: assignment of files to `YYYYMMDD` archive buckets
//! - [`path_utils`]: Unicode normalization of file names for matching
//!
//! # Example
//!
//! ```no_run
//! use photoclassify::scanner::Walker;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/media/card"));
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}", file.path().display()),
//!         Err(e) => eprintln!("Warning: {e}"),
//!     }
//! }
//! ```

pub mod dating;
pub mod path_utils;
pub mod walker;

use std::ffi::OsStr;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

pub use dating::{DateBucket, DateBucketer};
pub use walker::{WalkOutcome, Walker};

/// The metadata fields the matching pipeline looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    /// File size in bytes
    pub size: u64,
    /// Last modification time, when the platform reports one
    pub modified: Option<SystemTime>,
    /// Creation (birth) time, when the platform reports one
    pub created: Option<SystemTime>,
}

impl FileMeta {
    /// Extract the interesting fields from `std::fs::Metadata`.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
            created: metadata.created().ok(),
        }
    }

    /// Creation time, falling back to modification time.
    #[must_use]
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.created.or(self.modified)
    }
}

/// Immutable reference to a file on disk.
///
/// Metadata is read on first use and cached for the lifetime of the value.
/// A failed read is not cached, so a later call queries the filesystem again.
/// Relationships between files (candidates, twins) are never stored here;
/// see [`crate::matching::Relations`].
#[derive(Debug, Clone)]
pub struct FileRef {
    path: PathBuf,
    meta: OnceLock<FileMeta>,
}

impl FileRef {
    /// Reference a path whose metadata will be read on demand.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            meta: OnceLock::new(),
        }
    }

    /// Reference a path with metadata already known (e.g. from a walk).
    #[must_use]
    pub fn with_metadata(path: impl Into<PathBuf>, meta: FileMeta) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(meta);
        Self {
            path: path.into(),
            meta: cell,
        }
    }

    /// The referenced path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component.
    #[must_use]
    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }

    /// Metadata, read from the filesystem on first call.
    ///
    /// # Errors
    ///
    /// Returns a [`ScanError`] if the file cannot be stat'ed.
    pub fn metadata(&self) -> Result<FileMeta, ScanError> {
        if let Some(meta) = self.meta.get() {
            return Ok(*meta);
        }
        let metadata =
            std::fs::metadata(&self.path).map_err(|e| ScanError::from_io(&self.path, e))?;
        Ok(*self.meta.get_or_init(|| FileMeta::from_metadata(&metadata)))
    }

    /// File size in bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`ScanError`] if the file cannot be stat'ed.
    pub fn size(&self) -> Result<u64, ScanError> {
        self.metadata().map(|m| m.size)
    }
}

impl PartialEq for FileRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileRef {}

impl From<PathBuf> for FileRef {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

/// Errors that can occur while enumerating or stat'ing files.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The walk root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error raised for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// The path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}
