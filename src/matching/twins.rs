//! Content confirmation of candidate pairs.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use super::{worker_pool, CandidateSet, TwinSet};
use crate::compare::{CompareError, ContentComparator};
use crate::progress::{ProgressCallback, PHASE_TWINS};
use crate::scanner::FileRef;

/// Configuration for the twin resolver.
#[derive(Clone, Default)]
pub struct ResolverConfig {
    /// Run comparisons on a worker pool instead of the calling thread.
    pub parallel: bool,
    /// Worker count; `None` uses host parallelism.
    pub max_workers: Option<usize>,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("parallel", &self.parallel)
            .field("max_workers", &self.max_workers)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ResolverConfig {
    /// Toggle the worker pool.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Bound the worker pool.
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.max_workers = max_workers;
        self
    }

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

/// A candidate pair whose comparison failed.
///
/// Such pairs are neither twins nor proven different.
#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedPair {
    /// Origin index into the origin slice
    pub origin: usize,
    /// Destination index into the destination slice
    pub destination: usize,
    /// Origin path
    pub origin_path: PathBuf,
    /// Destination path
    pub destination_path: PathBuf,
    /// The comparison error, rendered
    pub reason: String,
}

/// Result of [`TwinResolver::find_twins`].
#[derive(Debug, Default)]
pub struct TwinReport {
    /// Confirmed twins per origin, in candidate order
    pub twins: TwinSet,
    /// Pairs whose comparison failed
    pub unresolved: Vec<UnresolvedPair>,
    /// Pairs never compared because shutdown was requested
    pub skipped: usize,
    /// Number of comparisons run to completion (equal or not)
    pub compared: usize,
}

impl TwinReport {
    /// Whether the run stopped early.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.skipped > 0
    }
}

/// Errors that abort twin resolution as a whole.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    /// The bounded worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

enum Outcome {
    Compared(Result<bool, CompareError>),
    Skipped,
}

/// Confirms candidate pairs by content.
#[derive(Debug, Default)]
pub struct TwinResolver {
    config: ResolverConfig,
}

impl TwinResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Compare every candidate pair and keep the identical ones.
    ///
    /// Each pair is one independent unit. A unit that fails is logged and
    /// reported in [`TwinReport::unresolved`]; siblings carry on. Once the
    /// shutdown flag is raised no further unit starts, units already running
    /// finish. Results are merged in candidate order, so sequential and
    /// parallel runs yield the same [`TwinSet`].
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ThreadPool`] if the worker pool cannot be built.
    pub fn find_twins(
        &self,
        origins: &[FileRef],
        destinations: &[FileRef],
        candidates: &CandidateSet,
        comparator: &dyn ContentComparator,
    ) -> Result<TwinReport, ResolveError> {
        let pairs: Vec<(usize, usize)> = candidates.pairs().collect();
        log::info!(
            "Comparing {} candidate pairs ({})",
            pairs.len(),
            if self.config.parallel {
                "parallel"
            } else {
                "sequential"
            }
        );

        if let Some(cb) = &self.config.progress_callback {
            cb.on_phase_start(PHASE_TWINS, pairs.len());
        }

        let done = AtomicUsize::new(0);
        let unit = |&(o, d): &(usize, usize)| -> Outcome {
            if self.config.is_shutdown_requested() {
                return Outcome::Skipped;
            }
            let result = comparator.identical(&origins[o], &destinations[d]);
            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(cb) = &self.config.progress_callback {
                cb.on_progress(n, &origins[o].path().to_string_lossy());
            }
            Outcome::Compared(result)
        };

        let outcomes: Vec<Outcome> = if self.config.parallel {
            let pool = worker_pool(self.config.max_workers)?;
            pool.install(|| pairs.par_iter().map(unit).collect())
        } else {
            pairs.iter().map(unit).collect()
        };

        let mut report = TwinReport {
            twins: TwinSet::new(candidates.len()),
            ..TwinReport::default()
        };
        for (&(o, d), outcome) in pairs.iter().zip(outcomes) {
            match outcome {
                Outcome::Compared(Ok(true)) => {
                    report.compared += 1;
                    report.twins.push(o, d);
                }
                Outcome::Compared(Ok(false)) => report.compared += 1,
                Outcome::Compared(Err(e)) => {
                    log::warn!(
                        "Could not compare {} with {}: {}",
                        origins[o].path().display(),
                        destinations[d].path().display(),
                        e
                    );
                    report.unresolved.push(UnresolvedPair {
                        origin: o,
                        destination: d,
                        origin_path: origins[o].path().to_path_buf(),
                        destination_path: destinations[d].path().to_path_buf(),
                        reason: e.to_string(),
                    });
                }
                Outcome::Skipped => report.skipped += 1,
            }
        }

        if let Some(cb) = &self.config.progress_callback {
            cb.on_phase_end(PHASE_TWINS);
        }
        if report.interrupted() {
            log::info!("Twin resolution interrupted, {} pairs skipped", report.skipped);
        }
        log::debug!(
            "Twins: {} confirmed, {} unresolved, {} compared",
            report.twins.pair_count(),
            report.unresolved.len(),
            report.compared
        );
        Ok(report)
    }
}
