//! Cheap-filter candidate matching.

use std::collections::HashMap;

use super::{CandidateSet, Filter, FilterChain};
use crate::naming::PhotoName;
use crate::progress::{ProgressCallback, PHASE_CANDIDATES};
use crate::scanner::{FileRef, ScanError};

/// Output of [`find_candidates`].
#[derive(Debug, Default)]
pub struct CandidateMatch {
    /// Destinations passing every filter, per origin
    pub candidates: CandidateSet,
    /// Pairs whose metadata could not be read; such pairs are not candidates
    pub errors: Vec<ScanError>,
}

/// Pair every origin file with the destination files its filters accept.
///
/// When the chain contains [`Filter::Name`], destinations are indexed by
/// counter-free normalized name and each origin is tested only against the
/// files sharing its name. Several destination files with the same name are
/// all kept as candidates. Without a name filter every pair is tested.
///
/// Candidate order follows destination order. No file contents are read.
#[must_use]
pub fn find_candidates(
    origins: &[FileRef],
    destinations: &[FileRef],
    chain: &FilterChain,
    progress: Option<&dyn ProgressCallback>,
) -> CandidateMatch {
    let mut result = CandidateMatch {
        candidates: CandidateSet::new(origins.len()),
        errors: Vec::new(),
    };

    if let Some(cb) = progress {
        cb.on_phase_start(PHASE_CANDIDATES, origins.len());
    }

    let by_name = chain
        .contains(Filter::Name)
        .then(|| index_by_name(destinations));

    for (o, origin) in origins.iter().enumerate() {
        let pool: Box<dyn Iterator<Item = usize>> = match &by_name {
            Some(index) => {
                let key = PhotoName::from_path(origin.path()).name_key();
                match index.get(&key) {
                    Some(found) => Box::new(found.iter().copied()),
                    None => Box::new(std::iter::empty()),
                }
            }
            None => Box::new(0..destinations.len()),
        };

        for d in pool {
            match chain.matches(origin, &destinations[d]) {
                Ok(true) => result.candidates.push(o, d),
                Ok(false) => {}
                Err(e) => {
                    log::warn!(
                        "Cannot filter {} against {}: {}",
                        origin.path().display(),
                        destinations[d].path().display(),
                        e
                    );
                    result.errors.push(e);
                }
            }
        }

        if let Some(cb) = progress {
            cb.on_progress(o + 1, &origin.path().to_string_lossy());
        }
    }

    if let Some(cb) = progress {
        cb.on_phase_end(PHASE_CANDIDATES);
    }
    log::debug!(
        "Candidates: {} pairs for {} of {} origin files",
        result.candidates.pair_count(),
        result.candidates.with_links().count(),
        origins.len()
    );
    result
}

/// Destination indices grouped by name key, each list in walk order.
fn index_by_name(destinations: &[FileRef]) -> HashMap<String, Vec<usize>> {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, file) in destinations.iter().enumerate() {
        index
            .entry(PhotoName::from_path(file.path()).name_key())
            .or_default()
            .push(i);
    }
    index
}
