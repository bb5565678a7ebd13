//! Cheap pairwise predicates over file metadata.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::naming::PhotoName;
use crate::scanner::{FileRef, ScanError};

/// A metadata predicate over an (origin, destination) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Same stem and extension, ignoring any `_xHH` counter
    Name,
    /// Same size in bytes
    Size,
    /// Same creation time
    Created,
    /// Same modification time
    Modified,
}

impl Filter {
    /// Evaluate the predicate.
    ///
    /// # Errors
    ///
    /// Returns a [`ScanError`] when metadata for either file is unavailable.
    /// [`Filter::Name`] never fails.
    pub fn matches(self, a: &FileRef, b: &FileRef) -> Result<bool, ScanError> {
        Ok(match self {
            Self::Name => PhotoName::from_path(a.path()).same_name(&PhotoName::from_path(b.path())),
            Self::Size => a.metadata()?.size == b.metadata()?.size,
            Self::Created => a.metadata()?.created == b.metadata()?.created,
            Self::Modified => a.metadata()?.modified == b.metadata()?.modified,
        })
    }

    /// Name used on the command line and in config files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Size => "size",
            Self::Created => "created",
            Self::Modified => "modified",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unknown filter name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown filter '{0}' (expected one of: name, size, created, modified)")]
pub struct FilterParseError(pub String);

impl FromStr for Filter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "same_name" => Ok(Self::Name),
            "size" | "same_size" => Ok(Self::Size),
            "created" | "ctime" | "same_created" => Ok(Self::Created),
            "modified" | "mtime" | "same_modified" => Ok(Self::Modified),
            other => Err(FilterParseError(other.to_string())),
        }
    }
}

/// Ordered conjunction of filters, evaluated left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterChain(Vec<Filter>);

impl Default for FilterChain {
    /// Name then size.
    fn default() -> Self {
        Self(vec![Filter::Name, Filter::Size])
    }
}

impl FilterChain {
    /// Chain from an explicit list. An empty chain accepts every pair.
    #[must_use]
    pub fn new(filters: Vec<Filter>) -> Self {
        Self(filters)
    }

    /// The filters in evaluation order.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.0
    }

    /// Whether the chain holds no filter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `filter` is part of the chain.
    #[must_use]
    pub fn contains(&self, filter: Filter) -> bool {
        self.0.contains(&filter)
    }

    /// True when every filter accepts the pair. Stops at the first rejection.
    ///
    /// # Errors
    ///
    /// Propagates the first metadata failure.
    pub fn matches(&self, a: &FileRef, b: &FileRef) -> Result<bool, ScanError> {
        for filter in &self.0 {
            if !filter.matches(a, b)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl FromStr for FilterChain {
    type Err = FilterParseError;

    /// Parse a comma-separated list such as `name,size`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Filter::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|filter| filter.as_str()).collect();
        f.write_str(&names.join(","))
    }
}
