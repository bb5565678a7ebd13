//! Byte-identity checks between two files.
//!
//! Two interchangeable strategies implement [`ContentComparator`]:
//!
//! - [`HashComparator`]: SHA-256 of each file, memoized per path so a file
//!   compared against many candidates is read once
//! - [`StreamComparator`]: lockstep chunked read that stops at the first
//!   differing chunk and never buffers a whole file
//!
//! Both answer `false` for files of different size without opening either
//! one, and both report read failures as [`CompareError`] rather than `false`.
//!
//! # Example
//!
//! ```no_run
//! use photoclassify::compare::{CompareStrategy, ContentComparator};
//! use photoclassify::scanner::FileRef;
//!
//! let comparator = CompareStrategy::Stream.build(8192);
//! let same = comparator
//!     .identical(&FileRef::new("/card/IMG_1.JPG"), &FileRef::new("/archive/IMG_1.JPG"))
//!     .unwrap();
//! # let _ = same;
//! ```

mod hash;
mod stream;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::scanner::{FileRef, ScanError};

pub use hash::{ContentHash, HashComparator};
pub use stream::StreamComparator;

/// Default read size for both strategies.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Errors raised while comparing two files.
#[derive(thiserror::Error, Debug)]
pub enum CompareError {
    /// Metadata for one side could not be read.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Opening or reading one side failed.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl CompareError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Decides whether two files hold the same bytes.
pub trait ContentComparator: Send + Sync {
    /// `Ok(true)` when `a` and `b` are byte-identical.
    ///
    /// # Errors
    ///
    /// Returns [`CompareError`] when either file cannot be stat'ed or read.
    /// An error never means "different".
    fn identical(&self, a: &FileRef, b: &FileRef) -> Result<bool, CompareError>;
}

impl<C: ContentComparator + ?Sized> ContentComparator for Arc<C> {
    fn identical(&self, a: &FileRef, b: &FileRef) -> Result<bool, CompareError> {
        (**self).identical(a, b)
    }
}

impl<C: ContentComparator + ?Sized> ContentComparator for &C {
    fn identical(&self, a: &FileRef, b: &FileRef) -> Result<bool, CompareError> {
        (**self).identical(a, b)
    }
}

/// Cheap pre-check shared by every strategy.
///
/// Returns `Ok(true)` when the sizes differ, which settles the comparison
/// without touching file contents.
pub fn sizes_differ(a: &FileRef, b: &FileRef) -> Result<bool, CompareError> {
    Ok(a.size()? != b.size()?)
}

/// Which comparator to build.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CompareStrategy {
    /// SHA-256 digests, cached per path
    #[default]
    Hash,
    /// Chunk-by-chunk lockstep read
    Stream,
}

impl CompareStrategy {
    /// Build a comparator for this strategy.
    #[must_use]
    pub fn build(self, chunk_size: usize) -> Arc<dyn ContentComparator> {
        match self {
            Self::Hash => Arc::new(HashComparator::with_chunk_size(chunk_size)),
            Self::Stream => Arc::new(StreamComparator::new(chunk_size)),
        }
    }
}

impl std::fmt::Display for CompareStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hash => write!(f, "hash"),
            Self::Stream => write!(f, "stream"),
        }
    }
}

/// Fill `buf` as far as the reader allows.
///
/// Returns fewer bytes than `buf.len()` only at end of file, so two readers
/// filled this way stay aligned chunk for chunk.
pub(crate) fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
