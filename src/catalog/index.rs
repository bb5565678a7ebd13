//! Duplicate and idle detection over `(path, hash)` records.
//!
//! Groups and the paths inside them keep the order in which their records
//! appear; nothing is sorted here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// One `(path, hash)` row of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashRecord {
    /// File path
    pub path: PathBuf,
    /// Content hash, hex encoded
    pub hash: String,
}

impl HashRecord {
    /// Create a record.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
        }
    }
}

/// Paths sharing one hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// The shared hash
    pub hash: String,
    /// Member paths, in record order
    pub paths: Vec<PathBuf>,
}

/// Query result: groups, or their paths concatenated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Listing {
    /// One entry per hash group
    Grouped(Vec<DuplicateGroup>),
    /// Every path of every group, group by group
    Flat(Vec<PathBuf>),
}

impl Listing {
    fn from_groups(groups: Vec<DuplicateGroup>, grouped: bool) -> Self {
        if grouped {
            Self::Grouped(groups)
        } else {
            Self::Flat(groups.into_iter().flat_map(|g| g.paths).collect())
        }
    }

    /// Number of groups or paths.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Grouped(groups) => groups.len(),
            Self::Flat(paths) => paths.len(),
        }
    }

    /// True when nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Non-fatal conditions raised by the index queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWarning {
    /// No archive directory is tagged, so every group counts as idle.
    NoArchiveDirectories,
}

impl std::fmt::Display for IndexWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoArchiveDirectories => f.write_str("No directories tagged as archive"),
        }
    }
}

/// Invert path → hash into hash groups, first-seen order.
fn group_by_hash(records: &[HashRecord]) -> Vec<DuplicateGroup> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    for record in records {
        match position.get(record.hash.as_str()) {
            Some(&i) => groups[i].paths.push(record.path.clone()),
            None => {
                position.insert(&record.hash, groups.len());
                groups.push(DuplicateGroup {
                    hash: record.hash.clone(),
                    paths: vec![record.path.clone()],
                });
            }
        }
    }
    groups
}

/// Groups of two or more paths sharing a hash.
#[must_use]
pub fn find_duplicates(records: &[HashRecord], grouped: bool) -> Listing {
    let groups = group_by_hash(records)
        .into_iter()
        .filter(|g| g.paths.len() >= 2)
        .collect();
    Listing::from_groups(groups, grouped)
}

/// Groups none of whose paths lies under an archive directory.
///
/// By default only duplicate groups are considered; `include_singletons`
/// lets single-path groups qualify too. Without archive directories every
/// considered group is idle and [`IndexWarning::NoArchiveDirectories`] is
/// returned (and logged).
#[must_use]
pub fn find_idle(
    records: &[HashRecord],
    archive_dirs: &[PathBuf],
    grouped: bool,
    include_singletons: bool,
) -> (Listing, Option<IndexWarning>) {
    let warning = archive_dirs.is_empty().then(|| {
        log::warn!("{}, idle detection flags every group", IndexWarning::NoArchiveDirectories);
        IndexWarning::NoArchiveDirectories
    });

    let min_len = if include_singletons { 1 } else { 2 };
    let groups = group_by_hash(records)
        .into_iter()
        .filter(|g| g.paths.len() >= min_len)
        .filter(|g| !g.paths.iter().any(|p| is_archived(p, archive_dirs)))
        .collect();
    (Listing::from_groups(groups, grouped), warning)
}

/// Whether `path` lies under one of `archive_dirs` (component-wise).
#[must_use]
pub fn is_archived(path: &Path, archive_dirs: &[PathBuf]) -> bool {
    archive_dirs.iter().any(|dir| path.starts_with(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<HashRecord> {
        vec![
            HashRecord::new("/home/a.jpg", "h1"),
            HashRecord::new("/backup/a.jpg", "h1"),
            HashRecord::new("/home/b.jpg", "h2"),
            HashRecord::new("/archive/c.jpg", "h3"),
            HashRecord::new("/home/c.jpg", "h3"),
        ]
    }

    #[test]
    fn test_duplicates_grouped_and_flat() {
        let grouped = find_duplicates(&records(), true);
        match &grouped {
            Listing::Grouped(groups) => {
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].hash, "h1");
                assert_eq!(
                    groups[0].paths,
                    vec![PathBuf::from("/home/a.jpg"), PathBuf::from("/backup/a.jpg")]
                );
                assert_eq!(groups[1].hash, "h3");
            }
            Listing::Flat(_) => panic!("Expected grouped listing"),
        }

        let flat = find_duplicates(&records(), false);
        assert_eq!(flat.len(), 4);
    }

    #[test]
    fn test_idle_excludes_archived_groups() {
        let (idle, warning) = find_idle(&records(), &["/archive".into()], true, false);
        assert!(warning.is_none());
        match idle {
            Listing::Grouped(groups) => {
                assert_eq!(groups.len(), 1);
                assert_eq!(groups[0].hash, "h1");
            }
            Listing::Flat(_) => panic!("Expected grouped listing"),
        }

        let (idle, _) = find_idle(&records(), &["/archive".into()], false, true);
        assert_eq!(
            idle,
            Listing::Flat(vec![
                "/home/a.jpg".into(),
                "/backup/a.jpg".into(),
                "/home/b.jpg".into()
            ])
        );
    }

    #[test]
    fn test_prefix_match_is_component_wise() {
        assert!(is_archived(Path::new("/archive/x.jpg"), &["/archive".into()]));
        assert!(!is_archived(Path::new("/archive2/x.jpg"), &["/archive".into()]));
    }

    #[test]
    fn test_empty_records() {
        assert!(find_duplicates(&[], true).is_empty());
        let (idle, warning) = find_idle(&[], &[], false, false);
        assert!(idle.is_empty());
        assert_eq!(warning, Some(IndexWarning::NoArchiveDirectories));
    }
}
