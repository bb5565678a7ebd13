//! Lockstep chunked comparison.

use std::fs::File;
use std::io::BufReader;

use super::{read_chunk, sizes_differ, CompareError, ContentComparator, DEFAULT_CHUNK_SIZE};
use crate::scanner::FileRef;

/// Compares two files chunk by chunk, stopping at the first difference.
///
/// Memory use is two chunks regardless of file size.
#[derive(Debug, Clone, Copy)]
pub struct StreamComparator {
    chunk_size: usize,
}

impl Default for StreamComparator {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl StreamComparator {
    /// Comparator reading `chunk_size` bytes per side per step.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl ContentComparator for StreamComparator {
    fn identical(&self, a: &FileRef, b: &FileRef) -> Result<bool, CompareError> {
        if sizes_differ(a, b)? {
            return Ok(false);
        }

        let open = |file: &FileRef| {
            File::open(file.path())
                .map(BufReader::new)
                .map_err(|e| CompareError::io(file.path(), e))
        };
        let mut left = open(a)?;
        let mut right = open(b)?;

        let mut lbuf = vec![0u8; self.chunk_size];
        let mut rbuf = vec![0u8; self.chunk_size];
        loop {
            let ln = read_chunk(&mut left, &mut lbuf).map_err(|e| CompareError::io(a.path(), e))?;
            let rn =
                read_chunk(&mut right, &mut rbuf).map_err(|e| CompareError::io(b.path(), e))?;

            // One side ending first is a mismatch too.
            if ln != rn || lbuf[..ln] != rbuf[..rn] {
                log::trace!(
                    "Contents differ: {} vs {}",
                    a.path().display(),
                    b.path().display()
                );
                return Ok(false);
            }
            if ln == 0 {
                return Ok(true);
            }
        }
    }
}
