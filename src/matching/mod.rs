//! Two-stage matching of origin files against a destination tree.
//!
//! # Pipeline
//!
//! 1. **Candidates** ([`find_candidates`]): every origin file is paired with
//!    the destination files that pass a [`FilterChain`] of cheap metadata
//!    predicates. No file contents are read. Single-threaded.
//! 2. **Twins** ([`TwinResolver::find_twins`]): each candidate pair is
//!    confirmed byte-for-byte by a [`ContentComparator`](crate::compare::ContentComparator)
//!    on a bounded rayon pool.
//!
//! Files themselves are never annotated. Both stages produce a [`Relations`]
//! table indexed by position in the origin slice, pointing at positions in
//! the destination slice.
//!
//! # Example
//!
//! ```no_run
//! use photoclassify::compare::HashComparator;
//! use photoclassify::matching::{find_candidates, FilterChain, ResolverConfig, TwinResolver};
//! use photoclassify::scanner::Walker;
//! use std::path::Path;
//!
//! let origins = Walker::new(Path::new("/card")).collect_files(None).files;
//! let archive = Walker::new(Path::new("/archive")).collect_files(None).files;
//!
//! let matched = find_candidates(&origins, &archive, &FilterChain::default(), None);
//! let report = TwinResolver::new(ResolverConfig::default())
//!     .find_twins(&origins, &archive, &matched.candidates, &HashComparator::new())
//!     .unwrap();
//! for idx in report.twins.without_links() {
//!     println!("no copy: {}", origins[idx].path().display());
//! }
//! ```

mod candidates;
mod filters;
mod twins;

use std::collections::BTreeSet;

pub use candidates::{find_candidates, CandidateMatch};
pub use filters::{Filter, FilterChain, FilterParseError};
pub use twins::{ResolveError, ResolverConfig, TwinReport, TwinResolver, UnresolvedPair};

/// Origin → destination links, indexed by position.
///
/// `links[i]` lists destination indices related to origin `i`, in destination
/// enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relations {
    links: Vec<Vec<usize>>,
}

/// Destinations passing the cheap filters, per origin.
pub type CandidateSet = Relations;

/// Destinations confirmed byte-identical, per origin.
pub type TwinSet = Relations;

impl Relations {
    /// Empty table for `origins` origin files.
    #[must_use]
    pub fn new(origins: usize) -> Self {
        Self {
            links: vec![Vec::new(); origins],
        }
    }

    /// Link origin `origin` to destination `destination`.
    ///
    /// # Panics
    ///
    /// Panics if `origin` is out of range.
    pub fn push(&mut self, origin: usize, destination: usize) {
        self.links[origin].push(destination);
    }

    /// Destinations linked to `origin`; empty when out of range.
    #[must_use]
    pub fn get(&self, origin: usize) -> &[usize] {
        self.links.get(origin).map_or(&[], Vec::as_slice)
    }

    /// Number of origin slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True when there are no origin slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Origins with at least one link, ascending.
    pub fn with_links(&self) -> impl Iterator<Item = usize> + '_ {
        self.links
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.is_empty())
            .map(|(i, _)| i)
    }

    /// Origins with no link, ascending.
    pub fn without_links(&self) -> impl Iterator<Item = usize> + '_ {
        self.links
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_empty())
            .map(|(i, _)| i)
    }

    /// Every `(origin, destination)` pair, origin-major.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.links
            .iter()
            .enumerate()
            .flat_map(|(o, ds)| ds.iter().map(move |&d| (o, d)))
    }

    /// Total number of links.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.links.iter().map(Vec::len).sum()
    }

    /// Destination indices referenced by any origin.
    #[must_use]
    pub fn targets(&self) -> BTreeSet<usize> {
        self.links.iter().flatten().copied().collect()
    }

    /// Links as sets, for order-insensitive comparison.
    #[must_use]
    pub fn as_sets(&self) -> Vec<BTreeSet<usize>> {
        self.links
            .iter()
            .map(|l| l.iter().copied().collect())
            .collect()
    }
}

/// Build the bounded worker pool shared by comparison and copy stages.
///
/// `None` means one worker per available core.
pub(crate) fn worker_pool(
    max_workers: Option<usize>,
) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    let threads = max_workers.filter(|&n| n > 0).unwrap_or_else(|| {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    });
    log::debug!("Worker pool with {threads} threads");
    rayon::ThreadPoolBuilder::new().num_threads(threads).build()
}
