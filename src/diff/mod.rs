//! Comparison of an origin tree against a destination tree.
//!
//! An [`Analysis`] walks both trees, pairs files through the cheap filter
//! chain and confirms the pairs by content. The result answers which origin
//! files already have a copy and feeds the text report ([`report`]), the
//! size histogram ([`histogram`]) and the JSON output.

pub mod histogram;
pub mod report;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::compare::{CompareStrategy, DEFAULT_CHUNK_SIZE};
use crate::config::Config;
use crate::matching::{
    find_candidates, CandidateSet, FilterChain, ResolveError, ResolverConfig, TwinReport,
    TwinResolver, TwinSet, UnresolvedPair,
};
use crate::progress::ProgressCallback;
use crate::scanner::{FileRef, ScanError, Walker};

pub use histogram::{HistogramSeries, SizeHistogram};
pub use report::{write_report, ReportSections};

/// Errors that abort an analysis.
#[derive(thiserror::Error, Debug)]
pub enum DiffError {
    /// A tree root is missing or not a directory.
    #[error("Cannot read {role} tree: {source}")]
    Root {
        /// "origin" or "destination"
        role: &'static str,
        /// The underlying scan error
        #[source]
        source: ScanError,
    },

    /// Twin resolution could not run.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// How an analysis matches and compares.
#[derive(Clone)]
pub struct DiffSettings {
    /// Cheap filters
    pub filters: FilterChain,
    /// Content comparison strategy
    pub strategy: CompareStrategy,
    /// Read size for comparisons
    pub chunk_size: usize,
    /// Compare on a worker pool
    pub parallel: bool,
    /// Worker count; `None` uses host parallelism
    pub max_workers: Option<usize>,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl Default for DiffSettings {
    fn default() -> Self {
        Self {
            filters: FilterChain::default(),
            strategy: CompareStrategy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel: true,
            max_workers: None,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl std::fmt::Debug for DiffSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffSettings")
            .field("filters", &self.filters)
            .field("strategy", &self.strategy)
            .field("chunk_size", &self.chunk_size)
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

impl DiffSettings {
    /// Settings from the `[matching]` section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            filters: config.matching.filters.clone(),
            strategy: config.matching.strategy,
            chunk_size: config.matching.chunk_size,
            parallel: config.matching.parallel,
            max_workers: config.matching.max_workers,
            ..Self::default()
        }
    }

    /// Set the filter chain.
    #[must_use]
    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    /// Set the comparison strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: CompareStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Toggle the worker pool.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
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

    fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::default()
            .with_parallel(self.parallel)
            .with_max_workers(self.max_workers);
        if let Some(flag) = &self.shutdown_flag {
            config = config.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(cb) = &self.progress_callback {
            config = config.with_progress_callback(Arc::clone(cb));
        }
        config
    }

    fn walker(&self, root: &Path) -> Walker {
        let walker = Walker::new(root);
        match &self.shutdown_flag {
            Some(flag) => walker.with_shutdown_flag(Arc::clone(flag)),
            None => walker,
        }
    }
}

/// Origin and destination files with their candidate and twin relations.
#[derive(Debug)]
pub struct Analysis {
    origins: Vec<FileRef>,
    destinations: Vec<FileRef>,
    candidates: CandidateSet,
    resolved: TwinReport,
    errors: Vec<ScanError>,
    interrupted: bool,
}

impl Analysis {
    /// Walk both trees, then match and resolve.
    ///
    /// Unreadable entries inside either tree are kept in [`Analysis::errors`].
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Root`] when a root is missing or not a directory,
    /// and [`DiffError::Resolve`] when the worker pool cannot be built.
    pub fn run(
        origin: &Path,
        destination: &Path,
        settings: &DiffSettings,
    ) -> Result<Self, DiffError> {
        log::info!(
            "Comparing {} against {}",
            origin.display(),
            destination.display()
        );
        let progress = settings.progress_callback.as_deref();

        let origin_walker = settings.walker(origin);
        origin_walker
            .check_root()
            .map_err(|source| DiffError::Root { role: "origin", source })?;
        let destination_walker = settings.walker(destination);
        destination_walker
            .check_root()
            .map_err(|source| DiffError::Root {
                role: "destination",
                source,
            })?;

        let origins = origin_walker.collect_files(progress);
        let destinations = destination_walker.collect_files(progress);
        let walk_interrupted = origins.interrupted || destinations.interrupted;

        let mut analysis = Self::from_files(origins.files, destinations.files, settings)?;
        let mut errors = origins.errors;
        errors.extend(destinations.errors);
        errors.append(&mut analysis.errors);
        analysis.errors = errors;
        analysis.interrupted |= walk_interrupted;
        Ok(analysis)
    }

    /// Match and resolve already enumerated files.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Resolve`] when the worker pool cannot be built.
    pub fn from_files(
        origins: Vec<FileRef>,
        destinations: Vec<FileRef>,
        settings: &DiffSettings,
    ) -> Result<Self, DiffError> {
        let progress = settings.progress_callback.as_deref();
        let matched = find_candidates(&origins, &destinations, &settings.filters, progress);

        let comparator = settings.strategy.build(settings.chunk_size);
        let resolved = TwinResolver::new(settings.resolver_config()).find_twins(
            &origins,
            &destinations,
            &matched.candidates,
            comparator.as_ref(),
        )?;
        let interrupted = resolved.interrupted();

        Ok(Self {
            origins,
            destinations,
            candidates: matched.candidates,
            resolved,
            errors: matched.errors,
            interrupted,
        })
    }

    /// Origin files, in walk order.
    #[must_use]
    pub fn origins(&self) -> &[FileRef] {
        &self.origins
    }

    /// Destination files, in walk order.
    #[must_use]
    pub fn destinations(&self) -> &[FileRef] {
        &self.destinations
    }

    /// Destinations passing the cheap filters, per origin.
    #[must_use]
    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Destinations confirmed identical, per origin.
    #[must_use]
    pub fn twins(&self) -> &TwinSet {
        &self.resolved.twins
    }

    /// Candidate pairs whose comparison failed.
    #[must_use]
    pub fn unresolved(&self) -> &[UnresolvedPair] {
        &self.resolved.unresolved
    }

    /// Walk and metadata errors.
    #[must_use]
    pub fn errors(&self) -> &[ScanError] {
        &self.errors
    }

    /// Whether the analysis stopped early and is incomplete.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// Origin files with at least one twin.
    pub fn files_with_copy(&self) -> impl Iterator<Item = &FileRef> + '_ {
        self.twins().with_links().map(|i| &self.origins[i])
    }

    /// Origin files without any twin and without a failed comparison.
    pub fn files_without_copy(&self) -> impl Iterator<Item = &FileRef> + '_ {
        let pending = self.unresolved_origins();
        self.twins()
            .without_links()
            .filter(move |i| !pending.contains(i))
            .map(|i| &self.origins[i])
    }

    /// Origin files without any twin where at least one candidate could not
    /// be compared. Whether they have a copy is unknown.
    pub fn files_unresolved(&self) -> impl Iterator<Item = &FileRef> + '_ {
        self.unresolved_indices().into_iter().map(|i| &self.origins[i])
    }

    /// Indices of the origins listed by [`Self::files_unresolved`], ascending.
    pub(crate) fn unresolved_indices(&self) -> Vec<usize> {
        let pending = self.unresolved_origins();
        self.twins()
            .without_links()
            .filter(|i| pending.contains(i))
            .collect()
    }

    fn unresolved_origins(&self) -> BTreeSet<usize> {
        self.unresolved().iter().map(|pair| pair.origin).collect()
    }

    /// Destination files that are not a twin of any origin file.
    pub fn unrelated_destinations(&self) -> impl Iterator<Item = &FileRef> + '_ {
        let targets = self.twins().targets();
        self.destinations
            .iter()
            .enumerate()
            .filter(move |(i, _)| !targets.contains(i))
            .map(|(_, f)| f)
    }
}

/// Origin files that already have an identical copy in `destination`.
///
/// # Errors
///
/// See [`Analysis::run`].
pub fn find_files_with_copy(
    origin: &Path,
    destination: &Path,
    settings: &DiffSettings,
) -> Result<Vec<FileRef>, DiffError> {
    let analysis = Analysis::run(origin, destination, settings)?;
    Ok(analysis.files_with_copy().cloned().collect())
}

/// Origin files with no identical copy in `destination`. Origins whose
/// comparison failed are not included, see [`Analysis::files_unresolved`].
///
/// # Errors
///
/// See [`Analysis::run`].
pub fn find_files_without_copy(
    origin: &Path,
    destination: &Path,
    settings: &DiffSettings,
) -> Result<Vec<FileRef>, DiffError> {
    let analysis = Analysis::run(origin, destination, settings)?;
    Ok(analysis.files_without_copy().cloned().collect())
}
