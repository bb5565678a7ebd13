//! Recursive directory enumeration using jwalk.
//!
//! Every regular file under the root is reported: hidden files are kept,
//! empty files are kept, symlinks are not followed. Children are sorted by
//! name so two walks of the same tree yield the same order, which is the
//! order the candidate matcher preserves.
//!
//! # Example
//!
//! ```no_run
//! use photoclassify::scanner::Walker;
//! use std::path::Path;
//!
//! let outcome = Walker::new(Path::new("/archive")).collect_files(None);
//! println!("{} files, {} errors", outcome.files.len(), outcome.errors.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

use super::{FileMeta, FileRef, ScanError};
use crate::progress::{ProgressCallback, PHASE_WALKING};

/// Result of walking a whole tree.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Regular files in walk order
    pub files: Vec<FileRef>,
    /// Entries that could not be read; never fatal
    pub errors: Vec<ScanError>,
    /// The walk stopped early because shutdown was requested
    pub interrupted: bool,
}

/// Directory walker.
#[derive(Debug)]
pub struct Walker {
    root: PathBuf,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a walker rooted at `path`.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            root: path.to_path_buf(),
            shutdown_flag: None,
        }
    }

    /// Stop yielding entries once `flag` is raised.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the tree, yielding file references and per-entry errors.
    ///
    /// A missing root yields a single [`ScanError::NotFound`]; a root that is
    /// a file yields [`ScanError::NotADirectory`].
    pub fn walk(&self) -> Box<dyn Iterator<Item = Result<FileRef, ScanError>> + '_> {
        if let Err(e) = self.check_root() {
            return Box::new(std::iter::once(Err(e)));
        }

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(false)
            .sort(true);

        Box::new(
            walk_dir
                .into_iter()
                .take_while(move |_| {
                    if self.is_shutdown_requested() {
                        log::debug!("Walker: shutdown requested, stopping");
                        false
                    } else {
                        true
                    }
                })
                .filter_map(move |entry| match entry {
                    Ok(entry) => {
                        if !entry.file_type().is_file() {
                            return None;
                        }
                        let path = entry.path();
                        match std::fs::symlink_metadata(&path) {
                            Ok(metadata) => {
                                log::trace!("Found {}", path.display());
                                let meta = FileMeta::from_metadata(&metadata);
                                Some(Ok(FileRef::with_metadata(path, meta)))
                            }
                            Err(e) => Some(Err(self.warn(ScanError::from_io(&path, e)))),
                        }
                    }
                    Err(e) => {
                        let path = e
                            .path()
                            .map_or_else(|| self.root.clone(), Path::to_path_buf);
                        let err = ScanError::Io {
                            path,
                            source: std::io::Error::other(e.to_string()),
                        };
                        Some(Err(self.warn(err)))
                    }
                }),
        )
    }

    /// Check that the root exists and is a directory.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotADirectory`] for a file root, or the
    /// classified I/O error when the root cannot be stat'ed.
    pub fn check_root(&self) -> Result<(), ScanError> {
        match std::fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ScanError::NotADirectory(self.root.clone())),
            Err(e) => Err(ScanError::from_io(&self.root, e)),
        }
    }

    fn warn(&self, err: ScanError) -> ScanError {
        log::warn!("Walker error under {}: {}", self.root.display(), err);
        err
    }

    /// Walk the whole tree, separating files from errors.
    ///
    /// # Arguments
    ///
    /// * `progress` - Receives one `walking` phase with a tick per file
    #[must_use]
    pub fn collect_files(&self, progress: Option<&dyn ProgressCallback>) -> WalkOutcome {
        if let Some(cb) = progress {
            cb.on_phase_start(PHASE_WALKING, 0);
        }

        let mut outcome = WalkOutcome::default();
        for entry in self.walk() {
            match entry {
                Ok(file) => {
                    if let Some(cb) = progress {
                        cb.on_progress(outcome.files.len() + 1, &file.path().to_string_lossy());
                    }
                    outcome.files.push(file);
                }
                Err(e) => outcome.errors.push(e),
            }
        }
        outcome.interrupted = self.is_shutdown_requested();

        if let Some(cb) = progress {
            cb.on_phase_end(PHASE_WALKING);
        }
        log::debug!(
            "Walked {}: {} files, {} errors",
            self.root.display(),
            outcome.files.len(),
            outcome.errors.len()
        );
        outcome
    }
}
