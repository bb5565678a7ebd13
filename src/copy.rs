//! The copy workflow: origin tree into dated archive directories.
//!
//! [`copy_photographs`] enumerates the origin, assigns every file a date
//! bucket, creates the bucket directories, then hands each file to a
//! [`Placer`]. Outcomes are aggregated into a [`CopyResult`], which renders
//! the end-of-run report.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::compare::ContentComparator;
use crate::config::{self, Config, ConfigError};
use crate::matching::worker_pool;
use crate::placer::{Placement, PlaceError, Placer};
use crate::progress::{ProgressCallback, PHASE_COPY};
use crate::scanner::{DateBucketer, FileRef, ScanError, Walker};

/// Runtime hooks for a copy run.
#[derive(Clone, Default)]
pub struct CopyOptions {
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for CopyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyOptions")
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl CopyOptions {
    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Errors that stop a copy run before or outside per-file work.
#[derive(thiserror::Error, Debug)]
pub enum CopyError {
    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The origin tree cannot be walked.
    #[error("Cannot read origin: {0}")]
    Origin(#[source] ScanError),

    /// A bucket directory could not be created.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The bounded worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The report could not be written.
    #[error("Failed to write report: {0}")]
    Report(#[source] io::Error),
}

/// Aggregated outcome of a copy run.
///
/// Pairs are `(origin, destination)`. For failures the destination is the
/// directory the file was meant for.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyResult {
    /// Files that had a date bucket
    pub total: usize,
    /// Copied under their own name
    pub successful: Vec<(PathBuf, PathBuf)>,
    /// Already present with identical content
    pub existing: Vec<(PathBuf, PathBuf)>,
    /// Copied under a counter-suffixed name
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// Not placed
    pub unsuccessful: Vec<(PathBuf, PathBuf)>,
    /// Condition text of every failure, in encounter order
    pub errors: Vec<String>,
    /// Origin files deleted after verified placement
    pub removed: usize,
    /// Files never attempted because shutdown was requested
    pub skipped: usize,
    /// The walk or the placement stage stopped early
    pub interrupted: bool,
}

impl CopyResult {
    /// Whether any file or walk condition was recorded.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.unsuccessful.is_empty() || !self.errors.is_empty()
    }

    /// Write the end-of-run report.
    ///
    /// Level 1 prints the termination line, level 2 adds per-category
    /// counts with renamed and failed pairs, level 3 adds the existing pairs
    /// and the raw error texts.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn report(&self, level: u8, out: &mut dyn Write) -> io::Result<()> {
        let total = self.total;
        writeln!(out, "Copy terminated")?;
        if level >= 2 {
            writeln!(out, "Successful copies: {} out of {}", self.successful.len(), total)?;
            if !self.existing.is_empty() {
                writeln!(out, "***")?;
                writeln!(out, "Existing files: {} out of {}", self.existing.len(), total)?;
            }
        }
        if level >= 3 {
            writeln!(out, "{}", join_pairs(&self.existing))?;
        }
        if level >= 2 {
            if !self.renamed.is_empty() {
                writeln!(out, "***")?;
                writeln!(out, "Renamed files: {} out of {}", self.renamed.len(), total)?;
                writeln!(out, "{}", join_pairs(&self.renamed))?;
            }
            if !self.unsuccessful.is_empty() {
                writeln!(out, "***")?;
                writeln!(
                    out,
                    "Unsuccessful copies: {} out of {}",
                    self.unsuccessful.len(),
                    total
                )?;
                writeln!(out, "{}", join_pairs(&self.unsuccessful))?;
            }
            if self.removed > 0 {
                writeln!(out, "***")?;
                writeln!(out, "Removed from origin: {} out of {}", self.removed, total)?;
            }
            if self.skipped > 0 {
                writeln!(out, "***")?;
                writeln!(out, "Interrupted, not attempted: {} out of {}", self.skipped, total)?;
            }
        }
        if level >= 3 {
            writeln!(out, "> Errors encountered:")?;
            writeln!(out, "{}", self.errors.join("\n\t"))?;
        }
        writeln!(out, "***")
    }
}

fn join_pairs(pairs: &[(PathBuf, PathBuf)]) -> String {
    pairs
        .iter()
        .map(|(o, d)| format!("{} -> {}", o.display(), d.display()))
        .collect::<Vec<_>>()
        .join("\n\t")
}

/// Header block printed before copying starts.
///
/// # Errors
///
/// Propagates write failures.
pub fn write_header(
    out: &mut dyn Write,
    origin: &Path,
    destination: &Path,
    first_date: chrono::NaiveDate,
) -> io::Result<()> {
    writeln!(out, "Copying files:")?;
    writeln!(out, "\t         FROM: {:<30}", origin.display().to_string())?;
    writeln!(out, "\t           TO: {:<30}", destination.display().to_string())?;
    writeln!(
        out,
        "\tSTARTING DATE: {:<30}",
        first_date.format(config::PROCESS_AFTER_FORMAT).to_string()
    )
}

enum Outcome {
    Placed {
        placement: Placement,
        removal: Option<Result<(), String>>,
    },
    Failed(PlaceError),
    Skipped,
}

/// Copy every dated origin file into its archive directory.
///
/// Validates `config` first; nothing is touched when it is invalid. Each file
/// is an independent unit: failures are collected, never fatal. In parallel
/// mode the pool runs across bucket directories while the files of one
/// directory are placed in order. With
/// `date.auto_date` set, an uninterrupted run records today in the last-date
/// marker.
///
/// # Arguments
///
/// * `config` - Paths, dating and copy settings
/// * `options` - Shutdown flag and progress callback
/// * `out` - Receives the header and the report
///
/// # Errors
///
/// Returns [`CopyError`] for invalid configuration, an unreadable origin
/// root, an uncreatable bucket directory, or a failed report write.
pub fn copy_photographs(
    config: &Config,
    options: &CopyOptions,
    out: &mut dyn Write,
) -> Result<CopyResult, CopyError> {
    config.validate()?;
    let (origin, destination) = config.require_paths()?;
    let first_date = config.first_date()?;

    let mut walker = Walker::new(origin);
    walker.check_root().map_err(CopyError::Origin)?;

    write_header(out, origin, destination, first_date).map_err(CopyError::Report)?;

    let progress = options.progress_callback.as_deref();
    if let Some(flag) = &options.shutdown_flag {
        walker = walker.with_shutdown_flag(Arc::clone(flag));
    }
    let walked = walker.collect_files(progress);

    let mut result = CopyResult::default();
    result
        .errors
        .extend(walked.errors.iter().map(ToString::to_string));

    let bucketer =
        DateBucketer::new(first_date, config.date.day_starts_at).with_quarters(config.path.quarters);
    let mut jobs: Vec<(FileRef, PathBuf)> = Vec::new();
    for file in walked.files {
        match bucketer.bucket(&file) {
            Ok(Some(bucket)) => {
                let dir = bucketer.target_dir(destination, &bucket);
                jobs.push((file, dir));
            }
            Ok(None) => log::trace!("Too old, skipping {}", file.path().display()),
            Err(e) => {
                log::warn!("{e}");
                result.errors.push(e.to_string());
            }
        }
    }
    result.total = jobs.len();
    log::info!("{} files to place into {}", jobs.len(), destination.display());

    let directories: BTreeSet<&Path> = jobs.iter().map(|(_, dir)| dir.as_path()).collect();
    for dir in directories {
        fs::create_dir_all(dir).map_err(|source| CopyError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let comparator = config.matching.strategy.build(config.matching.chunk_size);
    let placer =
        Placer::new(Arc::clone(&comparator)).with_max_attempts(config.copy.max_rename_attempts);
    let remove = config.copy.remove_from_origin;

    if let Some(cb) = progress {
        cb.on_phase_start(PHASE_COPY, jobs.len());
    }
    let done = AtomicUsize::new(0);
    let unit = |(file, dir): &(FileRef, PathBuf)| -> Outcome {
        if options.is_shutdown_requested() {
            return Outcome::Skipped;
        }
        let outcome = match placer.place(file, dir) {
            Ok(placement) => {
                let removal = remove.then(|| remove_origin(file, &placement, comparator.as_ref()));
                Outcome::Placed { placement, removal }
            }
            Err(e) => Outcome::Failed(e),
        };
        let n = done.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(cb) = progress {
            if let Ok(size) = file.size() {
                cb.on_item_completed(size);
            }
            cb.on_progress(n, &file.path().to_string_lossy());
        }
        outcome
    };

    let outcomes: Vec<Outcome> = if config.copy.parallel {
        // Placements into one directory probe the same slots, so each
        // directory is a single sequential unit of work.
        let mut groups: BTreeMap<&Path, Vec<usize>> = BTreeMap::new();
        for (index, (_, dir)) in jobs.iter().enumerate() {
            groups.entry(dir.as_path()).or_default().push(index);
        }
        let groups: Vec<Vec<usize>> = groups.into_values().collect();
        let pool = worker_pool(config.copy.max_workers)?;
        let (unit, all) = (&unit, &jobs);
        let mut indexed: Vec<(usize, Outcome)> = pool.install(|| {
            groups
                .par_iter()
                .flat_map_iter(move |group| group.iter().map(move |&i| (i, unit(&all[i]))))
                .collect()
        });
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    } else {
        jobs.iter().map(unit).collect()
    };
    if let Some(cb) = progress {
        cb.on_phase_end(PHASE_COPY);
    }

    for ((file, dir), outcome) in jobs.iter().zip(outcomes) {
        let origin_path = file.path().to_path_buf();
        match outcome {
            Outcome::Placed { placement, removal } => {
                let pair = (origin_path, placement.path().to_path_buf());
                match placement {
                    Placement::Copied(_) => result.successful.push(pair),
                    Placement::Existing(_) => result.existing.push(pair),
                    Placement::Renamed(_) => result.renamed.push(pair),
                }
                match removal {
                    Some(Ok(())) => result.removed += 1,
                    Some(Err(reason)) => result.errors.push(reason),
                    None => {}
                }
            }
            Outcome::Failed(e) => {
                log::warn!("{e}");
                result.unsuccessful.push((origin_path, dir.clone()));
                result.errors.push(e.to_string());
            }
            Outcome::Skipped => result.skipped += 1,
        }
    }

    result.interrupted = walked.interrupted || result.skipped > 0;
    log::debug!(
        "Copy: {} copied, {} existing, {} renamed, {} failed, {} skipped",
        result.successful.len(),
        result.existing.len(),
        result.renamed.len(),
        result.unsuccessful.len(),
        result.skipped
    );

    result
        .report(config.copy.verbose, out)
        .map_err(CopyError::Report)?;

    if config.date.auto_date && !result.interrupted {
        config::write_last_date(&config.marker_path()?, None)?;
    }
    Ok(result)
}

/// Delete `file` once its placement is confirmed identical.
fn remove_origin(
    file: &FileRef,
    placement: &Placement,
    comparator: &dyn ContentComparator,
) -> Result<(), String> {
    let placed = FileRef::new(placement.path());
    match comparator.identical(file, &placed) {
        Ok(true) => fs::remove_file(file.path())
            .map(|()| log::trace!("Removed {}", file.path().display()))
            .map_err(|e| format!("Could not remove {}: {}", file.path().display(), e)),
        Ok(false) => Err(format!(
            "Kept {}: {} does not match after copy",
            file.path().display(),
            placement.path().display()
        )),
        Err(e) => Err(format!("Kept {}: {}", file.path().display(), e)),
    }
}
