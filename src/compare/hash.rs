//! SHA-256 comparison with a per-path digest cache.

use std::fs::File;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use super::{read_chunk, sizes_differ, CompareError, ContentComparator, DEFAULT_CHUNK_SIZE};
use crate::scanner::FileRef;

/// A SHA-256 digest.
pub type ContentHash = [u8; 32];

/// Compares files by SHA-256 digest.
///
/// Digests are memoized by path for the lifetime of the comparator. The cache
/// is append-only: files are assumed not to change during a run. Two workers
/// racing on the same uncached path both hash it and store the same value.
#[derive(Debug)]
pub struct HashComparator {
    cache: DashMap<PathBuf, ContentHash>,
    chunk_size: usize,
}

impl Default for HashComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl HashComparator {
    /// Comparator reading in [`DEFAULT_CHUNK_SIZE`] blocks.
    #[must_use]
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Comparator with a custom read size (minimum one byte).
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            cache: DashMap::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Digest of `path`, from the cache when available.
    ///
    /// # Errors
    ///
    /// Returns [`CompareError::Io`] if the file cannot be opened or read.
    /// Failures are not cached.
    pub fn hash(&self, path: &Path) -> Result<ContentHash, CompareError> {
        if let Some(hash) = self.cache.get(path) {
            log::trace!("Digest cache hit: {}", path.display());
            return Ok(*hash);
        }

        let digest = self.hash_uncached(path)?;
        self.cache.insert(path.to_path_buf(), digest);
        Ok(digest)
    }

    fn hash_uncached(&self, path: &Path) -> Result<ContentHash, CompareError> {
        let mut file = File::open(path).map_err(|e| CompareError::io(path, e))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = read_chunk(&mut file, &mut buf).map_err(|e| CompareError::io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize().into())
    }

    /// Number of paths whose digest is cached.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl ContentComparator for HashComparator {
    fn identical(&self, a: &FileRef, b: &FileRef) -> Result<bool, CompareError> {
        if sizes_differ(a, b)? {
            return Ok(false);
        }
        Ok(self.hash(a.path())? == self.hash(b.path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_known_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc");
        fs::write(&path, b"abc").unwrap();

        let digest = HashComparator::new().hash(&path).unwrap();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_identical_and_different_contents() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        let c = dir.path().join("c.jpg");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        fs::write(&c, b"diff bytes").unwrap();

        let cmp = HashComparator::with_chunk_size(3);
        assert!(cmp.identical(&FileRef::new(&a), &FileRef::new(&b)).unwrap());
        assert!(!cmp.identical(&FileRef::new(&a), &FileRef::new(&c)).unwrap());
    }

    #[test]
    fn test_digest_is_memoized() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        fs::write(&a, b"first").unwrap();

        let cmp = HashComparator::new();
        let before = cmp.hash(&a).unwrap();
        fs::write(&a, b"other").unwrap();
        assert_eq!(cmp.hash(&a).unwrap(), before);
        assert_eq!(cmp.cached_len(), 1);
    }

    #[test]
    fn test_missing_file_is_error_not_false() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        fs::write(&a, b"x").unwrap();
        let gone = FileRef::with_metadata(
            dir.path().join("gone.jpg"),
            crate::scanner::FileMeta {
                size: 1,
                modified: None,
                created: None,
            },
        );

        let cmp = HashComparator::new();
        match cmp.identical(&FileRef::new(&a), &gone) {
            Err(CompareError::Io { path, .. }) => assert_eq!(path, gone.path()),
            other => panic!("Expected Io error, got {other:?}"),
        }
        assert_eq!(cmp.cached_len(), 1);
    }
}
