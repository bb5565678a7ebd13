//! Collision-avoiding file names.
//!
//! A name like `IMG_0001_x02.JPG` is decomposed into the stem `IMG_0001`,
//! counter `2` and extension `.JPG`. A stem without the `_xHH` token has
//! counter `0`. Encoding always renders the token, so the first collision
//! moves a file from its bare name to `_x01`. Counters stop at
//! [`MAX_COUNTER`], the largest value two hex digits decode back to.
//!
//! ```
//! use photoclassify::naming::PhotoName;
//! use std::path::Path;
//!
//! let name = PhotoName::from_path(Path::new("/archive/20240101/IMG_0001.JPG"));
//! assert_eq!(name.counter(), 0);
//! let next = name.next().unwrap();
//! assert_eq!(next.file_name(), "IMG_0001_x01.JPG");
//! assert_eq!(next.path(), Path::new("/archive/20240101/IMG_0001_x01.JPG"));
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::scanner::path_utils::normalize_name;

fn counter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"_x([0-9a-f]{2})$").expect("valid counter pattern"))
}

/// Largest counter the `_xHH` token can carry.
pub const MAX_COUNTER: u32 = 0xff;

/// A file name split into stem, counter and extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhotoName {
    parent: PathBuf,
    stem: String,
    extension: String,
    counter: u32,
}

impl PhotoName {
    /// Build a name from its parts.
    ///
    /// `extension` includes the leading dot, or is empty. `counter` is at
    /// most [`MAX_COUNTER`].
    #[must_use]
    pub fn new(
        parent: impl Into<PathBuf>,
        stem: impl Into<String>,
        extension: impl Into<String>,
        counter: u32,
    ) -> Self {
        debug_assert!(counter <= MAX_COUNTER);
        Self {
            parent: parent.into(),
            stem: stem.into(),
            extension: extension.into(),
            counter,
        }
    }

    /// Decompose a path. Total over every path; non-UTF-8 bytes are
    /// replaced lossily.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let raw_stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let (stem, counter) = split_counter(&raw_stem);
        Self {
            parent,
            stem: stem.to_string(),
            extension,
            counter,
        }
    }

    /// Stem with any counter token removed.
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Extension including the leading dot, or empty.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Collision counter.
    #[must_use]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Directory the name lives in.
    #[must_use]
    pub fn parent(&self) -> &Path {
        &self.parent
    }

    /// Encoded file name: `stem + "_x" + hex counter + extension`.
    ///
    /// The counter is rendered as exactly two lowercase hex digits.
    /// [`Self::from_path`] recovers it from the result.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}_x{:02x}{}", self.stem, self.counter, self.extension)
    }

    /// Full path of the encoded name.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.parent.join(self.file_name())
    }

    /// The same name with the counter incremented, or `None` once the
    /// counter is at [`MAX_COUNTER`].
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        (self.counter < MAX_COUNTER).then(|| Self {
            counter: self.counter + 1,
            ..self.clone()
        })
    }

    /// Whether two names differ only by counter and parent directory.
    ///
    /// Comparison is on NFC-normalized stem and extension.
    #[must_use]
    pub fn same_name(&self, other: &Self) -> bool {
        self.name_key() == other.name_key()
    }

    /// Counter-free, normalized `stem + extension`, used to index files by name.
    #[must_use]
    pub fn name_key(&self) -> String {
        let mut key = normalize_name(&self.stem).into_owned();
        key.push_str(&normalize_name(&self.extension));
        key
    }
}

/// Strip a trailing `_xHH` token, returning the remaining stem and counter.
fn split_counter(stem: &str) -> (&str, u32) {
    match counter_pattern().captures(stem) {
        Some(caps) => {
            let whole = caps.get(0).map_or(stem.len(), |m| m.start());
            let counter = caps
                .get(1)
                .and_then(|hex| u32::from_str_radix(hex.as_str(), 16).ok())
                .unwrap_or(0);
            (&stem[..whole], counter)
        }
        None => (stem, 0),
    }
}
