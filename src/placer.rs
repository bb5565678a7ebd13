//! Collision-safe placement of one file into a directory.
//!
//! Every placement ends in exactly one of four states:
//!
//! | Outcome | Meaning |
//! |---|---|
//! | [`Placement::Copied`] | the bare name was free, file copied there |
//! | [`Placement::Existing`] | an identical file already sits at the bare name or a renamed slot, nothing written |
//! | [`Placement::Renamed`] | the bare name held different content, file copied to the first free `_xHH` slot |
//! | [`PlaceError`] | I/O failure, comparison failure, or the slot bound ran out |
//!
//! Existing files are never overwritten: the target is created with
//! `create_new`, so a slot taken between the existence check and the copy is
//! treated as occupied.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filetime::FileTime;
use serde::Serialize;

use crate::compare::{CompareError, ContentComparator};
use crate::naming::{PhotoName, MAX_COUNTER};
use crate::scanner::FileRef;

/// Default number of slots tried (bare name included).
pub const DEFAULT_MAX_ATTEMPTS: usize = 20;

/// The four terminal states of a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    /// Copied under its own name
    Success,
    /// Identical file already present
    Existing,
    /// Copied under a counter-suffixed name
    Renamed,
    /// Failed
    Error,
}

/// Successful placement outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Copied to this path (the bare name).
    Copied(PathBuf),
    /// An identical file already exists at this path.
    Existing(PathBuf),
    /// Copied to this renamed path.
    Renamed(PathBuf),
}

impl Placement {
    /// The path the origin now corresponds to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Copied(p) | Self::Existing(p) | Self::Renamed(p) => p,
        }
    }

    /// Status classification.
    #[must_use]
    pub fn status(&self) -> CopyStatus {
        match self {
            Self::Copied(_) => CopyStatus::Success,
            Self::Existing(_) => CopyStatus::Existing,
            Self::Renamed(_) => CopyStatus::Renamed,
        }
    }
}

/// Errors that end a placement.
#[derive(thiserror::Error, Debug)]
pub enum PlaceError {
    /// Every slot up to the bound holds a different file.
    #[error("Too many rename attempts for {origin} in {directory} ({attempts} slots occupied)")]
    RenameExhausted {
        /// File being placed
        origin: PathBuf,
        /// Target directory
        directory: PathBuf,
        /// Slots tried
        attempts: usize,
    },

    /// Reading the origin or writing the target failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Comparing against an occupied slot failed.
    #[error("Comparison failed: {0}")]
    Compare(#[from] CompareError),
}

impl PlaceError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Places origin files into destination directories.
#[derive(Clone)]
pub struct Placer {
    comparator: Arc<dyn ContentComparator>,
    max_attempts: usize,
}

impl std::fmt::Debug for Placer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Placer")
            .field("comparator", &"<comparator>")
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl Placer {
    /// Placer using `comparator` to recognize identical files.
    #[must_use]
    pub fn new(comparator: Arc<dyn ContentComparator>) -> Self {
        Self {
            comparator,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Number of slots to try, bare name included (minimum 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Place `origin` into `directory`.
    ///
    /// Slots are the bare name, then `_x01`, `_x02`, ... derived from it, up
    /// to `_xff`. An occupied slot with identical content ends in
    /// [`Placement::Existing`].
    ///
    /// # Errors
    ///
    /// - [`PlaceError::RenameExhausted`] when all slots hold other content or
    ///   the counter would pass [`MAX_COUNTER`]
    /// - [`PlaceError::Io`] when the origin cannot be read or a target written
    /// - [`PlaceError::Compare`] when an occupied slot cannot be compared
    pub fn place(&self, origin: &FileRef, directory: &Path) -> Result<Placement, PlaceError> {
        let file_name = origin.file_name().ok_or_else(|| {
            PlaceError::io(
                origin.path(),
                io::Error::new(ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;

        let bare = directory.join(file_name);
        let mut name = PhotoName::from_path(&bare);
        let mut slot = bare.clone();
        let mut tried = 0;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let Some(next) = name.next() else {
                    break;
                };
                slot = next.path();
                name = next;
            }
            tried += 1;

            if !is_occupied(&slot)? && copy_new(origin.path(), &slot)? {
                log::trace!("{} -> {}", origin.path().display(), slot.display());
                return Ok(if attempt == 0 {
                    Placement::Copied(slot)
                } else {
                    Placement::Renamed(slot)
                });
            }

            if self.comparator.identical(origin, &FileRef::new(&slot))? {
                log::trace!("{} already at {}", origin.path().display(), slot.display());
                return Ok(Placement::Existing(slot));
            }
        }

        Err(PlaceError::RenameExhausted {
            origin: origin.path().to_path_buf(),
            directory: directory.to_path_buf(),
            attempts: tried,
        })
    }
}

fn is_occupied(path: &Path) -> Result<bool, PlaceError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PlaceError::io(path, e)),
    }
}

/// Copy `src` to `dst` only if `dst` does not exist yet.
///
/// Returns `Ok(false)` when `dst` appeared in the meantime. Permissions and
/// access/modification times are carried over; a failure to set times is
/// logged, not returned. A partially written target is removed.
fn copy_new(src: &Path, dst: &Path) -> Result<bool, PlaceError> {
    let mut reader = File::open(src).map_err(|e| PlaceError::io(src, e))?;
    let meta = reader.metadata().map_err(|e| PlaceError::io(src, e))?;

    let mut writer = match OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(PlaceError::io(dst, e)),
    };

    if let Err(e) = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all()) {
        drop(writer);
        let _ = fs::remove_file(dst);
        return Err(PlaceError::io(dst, e));
    }
    drop(writer);

    if let Err(e) = fs::set_permissions(dst, meta.permissions()) {
        log::debug!("Could not copy permissions to {}: {}", dst.display(), e);
    }
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    if let Err(e) = filetime::set_file_times(dst, atime, mtime) {
        log::warn!("Could not preserve timestamps on {}: {}", dst.display(), e);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::StreamComparator;
    use tempfile::TempDir;

    fn placer() -> Placer {
        Placer::new(Arc::new(StreamComparator::default()))
    }

    #[test]
    fn test_copy_into_empty_directory_preserves_mtime() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("IMG.JPG");
        fs::write(&src, b"pixels").unwrap();
        let mtime = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, mtime).unwrap();
        let dest = dir.path().join("out");
        fs::create_dir(&dest).unwrap();

        let placed = placer().place(&FileRef::new(&src), &dest).unwrap();
        assert_eq!(placed, Placement::Copied(dest.join("IMG.JPG")));
        assert_eq!(placed.status(), CopyStatus::Success);
        assert_eq!(fs::read(placed.path()).unwrap(), b"pixels");
        let copied = fs::metadata(placed.path()).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&copied), mtime);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"x").unwrap();
        match placer().place(&FileRef::new(&src), &dir.path().join("nope")) {
            Err(PlaceError::Io { .. }) => {}
            other => panic!("Expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_bound_of_one_never_renames() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"new").unwrap();
        let dest = dir.path().join("d");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("a.jpg"), b"old").unwrap();

        match placer().with_max_attempts(1).place(&FileRef::new(&src), &dest) {
            Err(PlaceError::RenameExhausted { attempts, .. }) => assert_eq!(attempts, 1),
            other => panic!("Expected RenameExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_counter_stops_at_last_two_digit_slot() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("A_xfe.JPG");
        fs::write(&src, b"third").unwrap();
        let dest = dir.path().join("d");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("A_xfe.JPG"), b"first").unwrap();
        fs::write(dest.join("A_xff.JPG"), b"second").unwrap();

        match placer().place(&FileRef::new(&src), &dest) {
            Err(PlaceError::RenameExhausted { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("Expected RenameExhausted, got {other:?}"),
        }
        assert!(!dest.join("A_x100.JPG").exists());
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 2);
    }

    #[test]
    fn test_copy_new_refuses_existing_target() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("s");
        let dst = dir.path().join("d");
        fs::write(&src, b"one").unwrap();
        fs::write(&dst, b"two").unwrap();
        assert!(!copy_new(&src, &dst).unwrap());
        assert_eq!(fs::read(&dst).unwrap(), b"two");
    }
}
