//! Layered application configuration.
//!
//! Values are resolved, lowest priority first, from:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. `PHOTOCLASSIFY_*` environment variables, `__` separating sections
//!    (e.g. `PHOTOCLASSIFY_MATCHING__CHUNK_SIZE=65536`)
//! 4. command-line flags, merged by the `merge_*_args` methods
//!
//! ```toml
//! [path]
//! origin = "/media/card/DCIM"
//! destination = "/srv/photos"
//! quarters = true
//!
//! [date]
//! day_starts_at = 4
//! process_after = "01-01-2024"
//! auto_date = true
//!
//! [matching]
//! filters = ["name", "size"]
//! strategy = "stream"
//! ```
//!
//! [`Config::validate`] must pass before any file is touched.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, TimeDelta};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::{CopyArgs, MatchArgs};
use crate::compare::{CompareStrategy, DEFAULT_CHUNK_SIZE};
use crate::matching::FilterChain;
use crate::naming::MAX_COUNTER;
use crate::placer::DEFAULT_MAX_ATTEMPTS;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PHOTOCLASSIFY_";

/// Date format of `date.process_after`.
pub const PROCESS_AFTER_FORMAT: &str = "%d-%m-%Y";

/// File name of the last-processed-date marker.
pub const LAST_DATE_FILE: &str = ".lastdate";

/// Errors raised while loading or validating configuration.
///
/// All of them are fatal and surface before any file operation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The layered sources could not be merged or deserialized.
    #[error("Invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// `date.day_starts_at` outside 0..12.
    #[error("day_starts_at must be between 0 and 11 hours (was {0})")]
    DayStartsAt(u32),

    /// `date.process_after` is not `DD-MM-YYYY`.
    #[error("Invalid date '{value}', expected DD-MM-YYYY: {source}")]
    InvalidDate {
        /// The rejected text
        value: String,
        /// Parser error
        #[source]
        source: chrono::ParseError,
    },

    /// `matching.filters` is empty.
    #[error("The candidate filter chain must contain at least one filter")]
    EmptyFilterChain,

    /// `copy.max_rename_attempts` is zero.
    #[error("max_rename_attempts must be at least 1")]
    ZeroRenameBound,

    /// `copy.max_rename_attempts` exceeds the slots a two-digit counter names.
    #[error("max_rename_attempts must be at most {max}, got {value}")]
    RenameBoundTooLarge {
        /// Configured bound
        value: usize,
        /// Bare name plus every `_xHH` slot
        max: usize,
    },

    /// `matching.chunk_size` is zero.
    #[error("chunk_size must be at least 1 byte")]
    ZeroChunkSize,

    /// `copy.verbose` outside 1..=3.
    #[error("Report level must be 1, 2 or 3 (was {0})")]
    ReportLevel(u8),

    /// A required path was neither configured nor given on the command line.
    #[error("No {0} directory configured")]
    MissingPath(&'static str),

    /// With `path.safe`, a configured path is not an existing directory.
    #[error("The {role} path {path} is not a directory (invalid or unmounted)")]
    NotADirectory {
        /// "origin" or "destination"
        role: &'static str,
        /// The offending path
        path: PathBuf,
    },

    /// Platform directories could not be determined.
    #[error("Failed to determine project directories")]
    NoProjectDirs,

    /// The last-date marker could not be read or written.
    #[error("Last-date marker {path}: {source}")]
    Marker {
        /// Marker path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The last-date marker does not hold an ISO date.
    #[error("Last-date marker {path} does not hold a YYYY-MM-DD date")]
    MarkerFormat {
        /// Marker path
        path: PathBuf,
    },

    /// The configuration could not be rendered as TOML.
    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Origin and destination trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Tree files are copied from (e.g. a memory card)
    pub origin: Option<PathBuf>,
    /// Archive root
    pub destination: Option<PathBuf>,
    /// Nest day directories under `YYYYQn`
    pub quarters: bool,
    /// Refuse to run unless both paths are existing directories
    pub safe: bool,
}

/// Date-bucket settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateConfig {
    /// Hour (0-11) at which a new day begins
    pub day_starts_at: u32,
    /// Files dated before this `DD-MM-YYYY` day are ignored
    pub process_after: String,
    /// Take the first date from the last-date marker, and update it
    pub auto_date: bool,
    /// Include `process_after` itself (otherwise start the day after)
    pub include_first: bool,
    /// Marker location; defaults to `.lastdate` in the data directory
    pub marker_file: Option<PathBuf>,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            day_starts_at: 0,
            process_after: "01-01-1000".to_string(),
            auto_date: false,
            include_first: true,
            marker_file: None,
        }
    }
}

/// Copy workflow settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Report level: 1 summary, 2 counts, 3 full listing
    pub verbose: u8,
    /// Slots tried per file, bare name included
    pub max_rename_attempts: usize,
    /// Copy on a worker pool
    pub parallel: bool,
    /// Worker count; unset uses host parallelism
    pub max_workers: Option<usize>,
    /// Delete origin files once they are safely in the archive
    pub remove_from_origin: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            verbose: 2,
            max_rename_attempts: DEFAULT_MAX_ATTEMPTS,
            parallel: true,
            max_workers: None,
            remove_from_origin: false,
        }
    }
}

/// Matching pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Cheap filters, applied left to right
    pub filters: FilterChain,
    /// Content comparison strategy
    pub strategy: CompareStrategy,
    /// Read size for comparisons
    pub chunk_size: usize,
    /// Compare on a worker pool
    pub parallel: bool,
    /// Worker count; unset uses host parallelism
    pub max_workers: Option<usize>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            filters: FilterChain::default(),
            strategy: CompareStrategy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel: true,
            max_workers: None,
        }
    }
}

/// Catalog settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite file; defaults to `catalog.db` in the data directory
    pub database: Option<PathBuf>,
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[path]`
    pub path: PathConfig,
    /// `[date]`
    pub date: DateConfig,
    /// `[copy]`
    pub copy: CopyConfig,
    /// `[matching]`
    pub matching: MatchingConfig,
    /// `[catalog]`
    pub catalog: CatalogConfig,
}

impl Config {
    /// Platform project directories.
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "photoclassify", "photoclassify")
    }

    /// Default configuration file location.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Directory holding the last-date marker and the default catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] when no home directory exists.
    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or(ConfigError::NoProjectDirs)
    }

    /// The merged provider stack: defaults, TOML file, environment.
    ///
    /// A missing TOML file is skipped.
    #[must_use]
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let file = config_file
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path);

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            log::debug!("Config file: {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from defaults, file and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a source holds invalid values.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(config_file)
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Load configuration from defaults and one TOML file, ignoring the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when the file holds invalid values.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Render`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `copy` command flags.
    pub fn merge_copy_args(&mut self, args: &CopyArgs) {
        if let Some(origin) = &args.trees.origin {
            self.path.origin = Some(origin.clone());
        }
        if let Some(destination) = &args.trees.destination {
            self.path.destination = Some(destination.clone());
        }
        if args.quarters {
            self.path.quarters = true;
        }
        if let Some(hours) = args.day_starts_at {
            self.date.day_starts_at = hours;
        }
        if let Some(after) = &args.process_after {
            self.date.process_after = after.clone();
        }
        if args.no_include_first {
            self.date.include_first = false;
        }
        if args.auto_date {
            self.date.auto_date = true;
        }
        if let Some(level) = args.report_level {
            self.copy.verbose = level;
        }
        if args.remove {
            self.copy.remove_from_origin = true;
        }
        if args.workers.no_parallel {
            self.copy.parallel = false;
        }
        if args.workers.max_workers.is_some() {
            self.copy.max_workers = args.workers.max_workers;
        }
        if let Some(strategy) = args.strategy {
            self.matching.strategy = strategy;
        }
    }

    /// Apply the matching flags shared by `diff`, `report` and `hist`.
    pub fn merge_match_args(&mut self, args: &MatchArgs) {
        if let Some(origin) = &args.trees.origin {
            self.path.origin = Some(origin.clone());
        }
        if let Some(destination) = &args.trees.destination {
            self.path.destination = Some(destination.clone());
        }
        if let Some(filters) = &args.filter {
            self.matching.filters = filters.clone();
        }
        if let Some(strategy) = args.strategy {
            self.matching.strategy = strategy;
        }
        if args.workers.no_parallel {
            self.matching.parallel = false;
        }
        if args.workers.max_workers.is_some() {
            self.matching.max_workers = args.workers.max_workers;
        }
    }

    /// Check every setting that can be checked without touching files.
    ///
    /// With `path.safe`, configured paths must also be existing directories.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.date.day_starts_at >= 12 {
            return Err(ConfigError::DayStartsAt(self.date.day_starts_at));
        }
        self.process_after()?;
        if self.matching.filters.is_empty() {
            return Err(ConfigError::EmptyFilterChain);
        }
        if self.copy.max_rename_attempts == 0 {
            return Err(ConfigError::ZeroRenameBound);
        }
        let max = MAX_COUNTER as usize + 1;
        if self.copy.max_rename_attempts > max {
            return Err(ConfigError::RenameBoundTooLarge {
                value: self.copy.max_rename_attempts,
                max,
            });
        }
        if self.matching.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if !(1..=3).contains(&self.copy.verbose) {
            return Err(ConfigError::ReportLevel(self.copy.verbose));
        }
        if self.path.safe {
            for (role, path) in [
                ("origin", &self.path.origin),
                ("destination", &self.path.destination),
            ] {
                if let Some(path) = path {
                    if !path.is_dir() {
                        return Err(ConfigError::NotADirectory {
                            role,
                            path: path.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Origin and destination, both required.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingPath`] naming the absent one.
    pub fn require_paths(&self) -> Result<(&Path, &Path), ConfigError> {
        let origin = self
            .path
            .origin
            .as_deref()
            .ok_or(ConfigError::MissingPath("origin"))?;
        let destination = self
            .path
            .destination
            .as_deref()
            .ok_or(ConfigError::MissingPath("destination"))?;
        Ok((origin, destination))
    }

    /// Parsed `date.process_after`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDate`] for malformed text.
    pub fn process_after(&self) -> Result<NaiveDate, ConfigError> {
        NaiveDate::parse_from_str(self.date.process_after.trim(), PROCESS_AFTER_FORMAT).map_err(
            |source| ConfigError::InvalidDate {
                value: self.date.process_after.clone(),
                source,
            },
        )
    }

    /// Where the last-date marker lives.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] when no override is set and
    /// platform directories are unavailable.
    pub fn marker_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.date.marker_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join(LAST_DATE_FILE)),
        }
    }

    /// First day whose files are copied.
    ///
    /// With `auto_date`, a readable marker wins. Otherwise `process_after`,
    /// or the day after it when `include_first` is off.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDate`] for a malformed `process_after`.
    pub fn first_date(&self) -> Result<NaiveDate, ConfigError> {
        if self.date.auto_date {
            match self.marker_path().and_then(|p| read_last_date(&p)) {
                Ok(date) => return Ok(date),
                Err(e) => log::debug!("No usable last-date marker: {e}"),
            }
        }
        let after = self.process_after()?;
        if self.date.include_first {
            Ok(after)
        } else {
            Ok(after + TimeDelta::days(1))
        }
    }

    /// Default catalog database path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoProjectDirs`] when no override is set and
    /// platform directories are unavailable.
    pub fn catalog_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.catalog.database {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("catalog.db")),
        }
    }
}

/// Read the ISO date stored in a marker file.
///
/// # Errors
///
/// Returns [`ConfigError::Marker`] if the file cannot be read and
/// [`ConfigError::MarkerFormat`] if its first line is not `YYYY-MM-DD`.
pub fn read_last_date(path: &Path) -> Result<NaiveDate, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Marker {
        path: path.to_path_buf(),
        source,
    })?;
    let first_line = text.lines().next().unwrap_or_default().trim();
    NaiveDate::parse_from_str(first_line, "%Y-%m-%d").map_err(|_| ConfigError::MarkerFormat {
        path: path.to_path_buf(),
    })
}

/// Store `date` (today when `None`) in a marker file, creating its directory.
///
/// # Errors
///
/// Returns [`ConfigError::Marker`] on I/O failure.
pub fn write_last_date(path: &Path, date: Option<NaiveDate>) -> Result<(), ConfigError> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let marker_err = |source| ConfigError::Marker {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(marker_err)?;
    }
    fs::write(path, date.format("%Y-%m-%d").to_string()).map_err(marker_err)?;
    log::debug!("Last date {} written to {}", date, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::Filter;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.copy.max_rename_attempts, 20);
        assert_eq!(config.matching.chunk_size, 8192);
        assert_eq!(config.matching.filters.filters(), &[Filter::Name, Filter::Size]);
        assert_eq!(
            config.process_after().unwrap(),
            NaiveDate::from_ymd_opt(1000, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_validate_rejections() {
        let mut config = Config::default();
        config.date.day_starts_at = 12;
        assert!(matches!(config.validate(), Err(ConfigError::DayStartsAt(12))));

        let mut config = Config::default();
        config.date.process_after = "2024-01-01".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDate { .. })));

        let mut config = Config::default();
        config.matching.filters = FilterChain::new(vec![]);
        assert!(matches!(config.validate(), Err(ConfigError::EmptyFilterChain)));

        let mut config = Config::default();
        config.copy.max_rename_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRenameBound)));

        let mut config = Config::default();
        config.copy.max_rename_attempts = 256;
        assert!(config.validate().is_ok());
        config.copy.max_rename_attempts = 257;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RenameBoundTooLarge { value: 257, max: 256 })
        ));

        let mut config = Config::default();
        config.matching.chunk_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroChunkSize)));

        let mut config = Config::default();
        config.copy.verbose = 4;
        assert!(matches!(config.validate(), Err(ConfigError::ReportLevel(4))));
    }

    #[test]
    fn test_safe_mode_requires_directories() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.path.safe = true;
        config.path.origin = Some(dir.path().to_path_buf());
        config.path.destination = Some(dir.path().join("unmounted"));
        match config.validate() {
            Err(ConfigError::NotADirectory { role, .. }) => assert_eq!(role, "destination"),
            other => panic!("Expected NotADirectory, got {other:?}"),
        }

        config.path.safe = false;
        config.validate().unwrap();
    }

    #[test]
    fn test_first_date_include_first() {
        let mut config = Config::default();
        config.date.process_after = "15-03-2024".into();
        assert_eq!(
            config.first_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        config.date.include_first = false;
        assert_eq!(
            config.first_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 16).unwrap()
        );
    }

    #[test]
    fn test_first_date_from_marker() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("state").join(LAST_DATE_FILE);
        let mut config = Config::default();
        config.date.auto_date = true;
        config.date.process_after = "01-01-2020".into();
        config.date.marker_file = Some(marker.clone());

        // No marker yet: falls back to process_after.
        assert_eq!(
            config.first_date().unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
        );

        let day = NaiveDate::from_ymd_opt(2024, 7, 9).unwrap();
        write_last_date(&marker, Some(day)).unwrap();
        assert_eq!(read_last_date(&marker).unwrap(), day);
        assert_eq!(config.first_date().unwrap(), day);
    }

    #[test]
    fn test_garbled_marker() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join(LAST_DATE_FILE);
        fs::write(&marker, "yesterday").unwrap();
        assert!(matches!(
            read_last_date(&marker),
            Err(ConfigError::MarkerFormat { .. })
        ));
    }

    #[test]
    fn test_require_paths() {
        let mut config = Config::default();
        assert!(matches!(
            config.require_paths(),
            Err(ConfigError::MissingPath("origin"))
        ));
        config.path.origin = Some("/card".into());
        assert!(matches!(
            config.require_paths(),
            Err(ConfigError::MissingPath("destination"))
        ));
        config.path.destination = Some("/archive".into());
        assert!(config.require_paths().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.path.quarters = true;
        config.matching.strategy = CompareStrategy::Stream;
        let text = config.to_toml().unwrap();
        assert!(text.contains("[matching]"));

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.toml");
        fs::write(&file, text).unwrap();
        assert_eq!(Config::load_from_path(&file).unwrap(), config);
    }
}
