//! Date-bucket assignment for the copy workflow.
//!
//! A photograph goes into the directory named after the local calendar day
//! it was taken on, where a "day" may be shifted to start a few hours after
//! midnight so late-night pictures stay with the evening they belong to.
//!
//! ```
//! use chrono::NaiveDate;
//! use photoclassify::scanner::DateBucketer;
//! use std::path::Path;
//!
//! let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let bucketer = DateBucketer::new(first, 4).with_quarters(true);
//! let shot = first.and_hms_opt(3, 30, 0).unwrap().checked_add_days(chrono::Days::new(40)).unwrap();
//! let bucket = bucketer.bucket_for_local(shot).unwrap();
//! assert_eq!(bucket.datestamp(), "20240209");
//! assert_eq!(
//!     bucketer.target_dir(Path::new("/archive"), &bucket),
//!     Path::new("/archive/2024Q1/20240209")
//! );
//! ```

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta};

use super::{FileRef, ScanError};

/// Format of the bucket directory names.
pub const DATESTAMP_FORMAT: &str = "%Y%m%d";

/// One calendar day of the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateBucket(NaiveDate);

impl DateBucket {
    /// Bucket for a given day.
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The calendar day.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// `YYYYMMDD` directory name.
    #[must_use]
    pub fn datestamp(&self) -> String {
        self.0.format(DATESTAMP_FORMAT).to_string()
    }

    /// `YYYYQn` parent directory name.
    #[must_use]
    pub fn quarter(&self) -> String {
        format!("{:04}Q{}", self.0.year(), self.0.month0() / 3 + 1)
    }
}

/// Assigns files to date buckets.
#[derive(Debug, Clone)]
pub struct DateBucketer {
    first_date: NaiveDate,
    day_starts_at: u32,
    quarters: bool,
}

impl DateBucketer {
    /// Create a bucketer.
    ///
    /// # Arguments
    ///
    /// * `first_date` - Files dated before this day are skipped
    /// * `day_starts_at` - Hour (0-11) at which a new day begins
    #[must_use]
    pub fn new(first_date: NaiveDate, day_starts_at: u32) -> Self {
        Self {
            first_date,
            day_starts_at,
            quarters: false,
        }
    }

    /// Nest day directories under `YYYYQn`.
    #[must_use]
    pub fn with_quarters(mut self, quarters: bool) -> Self {
        self.quarters = quarters;
        self
    }

    /// Bucket for a local wall-clock time, or `None` if it predates the
    /// first date.
    #[must_use]
    pub fn bucket_for_local(&self, taken: NaiveDateTime) -> Option<DateBucket> {
        let shifted = taken - TimeDelta::hours(i64::from(self.day_starts_at));
        let date = shifted.date();
        (date >= self.first_date).then_some(DateBucket(date))
    }

    /// Bucket for a filesystem timestamp in the local time zone.
    #[must_use]
    pub fn bucket_for(&self, timestamp: SystemTime) -> Option<DateBucket> {
        let local: DateTime<Local> = timestamp.into();
        self.bucket_for_local(local.naive_local())
    }

    /// Bucket for a file from its creation time (or modification time).
    ///
    /// Returns `Ok(None)` for files that are too old or carry no timestamp.
    ///
    /// # Errors
    ///
    /// Returns a [`ScanError`] if the file cannot be stat'ed.
    pub fn bucket(&self, file: &FileRef) -> Result<Option<DateBucket>, ScanError> {
        let meta = file.metadata()?;
        match meta.timestamp() {
            Some(ts) => Ok(self.bucket_for(ts)),
            None => {
                log::warn!("No timestamp for {}, skipping", file.path().display());
                Ok(None)
            }
        }
    }

    /// Directory a bucket's files are copied into.
    #[must_use]
    pub fn target_dir(&self, destination: &Path, bucket: &DateBucket) -> PathBuf {
        if self.quarters {
            destination.join(bucket.quarter()).join(bucket.datestamp())
        } else {
            destination.join(bucket.datestamp())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_datestamp_and_quarter() {
        let bucket = DateBucket::new(NaiveDate::from_ymd_opt(2023, 10, 5).unwrap());
        assert_eq!(bucket.datestamp(), "20231005");
        assert_eq!(bucket.quarter(), "2023Q4");

        let march = DateBucket::new(NaiveDate::from_ymd_opt(2023, 3, 31).unwrap());
        assert_eq!(march.quarter(), "2023Q1");
        let april = DateBucket::new(NaiveDate::from_ymd_opt(2023, 4, 1).unwrap());
        assert_eq!(april.quarter(), "2023Q2");
    }

    #[test]
    fn test_day_start_shift_moves_small_hours_back() {
        let first = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let bucketer = DateBucketer::new(first, 5);

        let late_night = bucketer.bucket_for_local(at(2024, 6, 2, 3)).unwrap();
        assert_eq!(late_night.datestamp(), "20240601");

        let morning = bucketer.bucket_for_local(at(2024, 6, 2, 5)).unwrap();
        assert_eq!(morning.datestamp(), "20240602");
    }

    #[test]
    fn test_files_before_first_date_are_skipped() {
        let first = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let bucketer = DateBucketer::new(first, 0);
        assert!(bucketer.bucket_for_local(at(2024, 6, 1, 23)).is_none());
        assert!(bucketer.bucket_for_local(at(2024, 6, 2, 0)).is_some());
    }

    #[test]
    fn test_target_dir_layouts() {
        let bucket = DateBucket::new(NaiveDate::from_ymd_opt(2022, 8, 14).unwrap());
        let first = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let dest = Path::new("/archive");

        let flat = DateBucketer::new(first, 0);
        assert_eq!(flat.target_dir(dest, &bucket), Path::new("/archive/20220814"));

        let nested = DateBucketer::new(first, 0).with_quarters(true);
        assert_eq!(
            nested.target_dir(dest, &bucket),
            Path::new("/archive/2022Q3/20220814")
        );
    }

    #[test]
    fn test_bucket_reads_file_timestamp() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"x").unwrap();
        let first = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let bucket = DateBucketer::new(first, 0)
            .bucket(&FileRef::new(&path))
            .unwrap();
        assert!(bucket.is_some());
    }
}
