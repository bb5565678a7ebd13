//! SQLite storage for the catalog.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rusqlite::{params, Connection};
use serde::Serialize;

use super::index::{self, HashRecord, IndexWarning, Listing};
use super::{CatalogError, ARCHIVE_TAG};
use crate::compare::DEFAULT_CHUNK_SIZE;
use crate::matching::worker_pool;
use crate::scanner::Walker;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS hashes (
    path TEXT NOT NULL UNIQUE,
    hash TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS directories (
    path TEXT NOT NULL UNIQUE,
    tag  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_hashes_hash ON hashes(hash);
";

/// Outcome of [`Catalog::import_paths`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Files found under the given roots
    pub found: usize,
    /// Files already catalogued, not re-hashed
    pub known: usize,
    /// New records written
    pub added: usize,
    /// Files or entries that could not be read
    pub failed: usize,
}

/// Handle on a catalog database.
///
/// Each handle owns its connection; open as many independent catalogs as
/// needed.
pub struct Catalog {
    conn: Connection,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Catalog {
    /// Open or create the catalog at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the directory or database cannot be
    /// created.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        log::debug!("Catalog opened at {}", path.display());
        Self::init(conn)
    }

    /// Open a private in-memory catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlite`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert records, ignoring paths already present. Returns the number
    /// of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlite`] on database failure.
    pub fn add_hashes(&mut self, records: &[HashRecord]) -> Result<usize, CatalogError> {
        let tx = self.conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO hashes (path, hash) VALUES (?1, ?2)")?;
            for record in records {
                added += stmt.execute(params![record.path.to_string_lossy(), record.hash])?;
            }
        }
        tx.commit()?;
        log::info!("Added {} of {} hash records", added, records.len());
        Ok(added)
    }

    /// Walk `roots`, hash every file not yet catalogued with BLAKE3 on a
    /// worker pool, and store the results.
    ///
    /// Unreadable files are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on database failure or when the worker pool
    /// cannot be built.
    pub fn import_paths(
        &mut self,
        roots: &[PathBuf],
        max_workers: Option<usize>,
    ) -> Result<ImportSummary, CatalogError> {
        let mut summary = ImportSummary::default();
        let mut fresh: Vec<PathBuf> = Vec::new();
        {
            let mut known = self.conn.prepare("SELECT 1 FROM hashes WHERE path = ?1")?;
            for root in roots {
                let walked = Walker::new(root).collect_files(None);
                summary.failed += walked.errors.len();
                for file in walked.files {
                    summary.found += 1;
                    if known.exists(params![file.path().to_string_lossy()])? {
                        summary.known += 1;
                    } else {
                        fresh.push(file.path().to_path_buf());
                    }
                }
            }
        }

        log::info!("Hashing {} new files", fresh.len());
        let pool = worker_pool(max_workers).map_err(CatalogError::ThreadPool)?;
        let hashed: Vec<Option<HashRecord>> = pool.install(|| {
            fresh
                .par_iter()
                .map(|path| match hash_file(path) {
                    Ok(hash) => Some(HashRecord::new(path.clone(), hash)),
                    Err(e) => {
                        log::warn!("Skipping {}: {}", path.display(), e);
                        None
                    }
                })
                .collect()
        });

        let records: Vec<HashRecord> = hashed.into_iter().flatten().collect();
        summary.failed += fresh.len() - records.len();
        summary.added = self.add_hashes(&records)?;
        Ok(summary)
    }

    /// Tag a directory (e.g. `archive`). Tags are stored upper-case; a
    /// directory holds one tag, the latest wins.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlite`] on database failure.
    pub fn tag_directory(&self, path: &Path, tag: &str) -> Result<(), CatalogError> {
        self.conn.execute(
            "INSERT INTO directories (path, tag) VALUES (?1, ?2) \
             ON CONFLICT(path) DO UPDATE SET tag = excluded.tag",
            params![path.to_string_lossy(), tag.to_uppercase()],
        )?;
        log::debug!("Tagged {} as {}", path.display(), tag.to_uppercase());
        Ok(())
    }

    /// Every hash record, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlite`] on database failure.
    pub fn hash_records(&self) -> Result<Vec<HashRecord>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, hash FROM hashes ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(HashRecord::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Number of catalogued files.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlite`] on database failure.
    pub fn len(&self) -> Result<usize, CatalogError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM hashes", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    /// Directories carrying `tag`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlite`] on database failure.
    pub fn directories(&self, tag: &str) -> Result<Vec<PathBuf>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM directories WHERE tag = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map(params![tag.to_uppercase()], |row| {
            row.get::<_, String>(0).map(PathBuf::from)
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Directories tagged as archive.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlite`] on database failure.
    pub fn archive_directories(&self) -> Result<Vec<PathBuf>, CatalogError> {
        self.directories(ARCHIVE_TAG)
    }

    /// Look a file up by path fragment or hash prefix.
    ///
    /// Several matches are narrowed to the ones under an archive directory.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Ambiguous`] when more than one match remains.
    pub fn find(&self, identifier: &str) -> Result<Option<PathBuf>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT path FROM hashes WHERE path LIKE ?1 OR hash LIKE ?2 ORDER BY rowid",
        )?;
        let matches: Vec<PathBuf> = stmt
            .query_map(
                params![format!("%{identifier}%"), format!("{identifier}%")],
                |row| row.get::<_, String>(0).map(PathBuf::from),
            )?
            .collect::<Result<_, _>>()?;

        match matches.len() {
            0 => return Ok(None),
            1 => return Ok(matches.into_iter().next()),
            _ => {}
        }

        let archive = self.archive_directories()?;
        let mut archived: Vec<PathBuf> = matches
            .iter()
            .filter(|p| index::is_archived(p, &archive))
            .cloned()
            .collect();
        if archived.len() == 1 {
            return Ok(archived.pop());
        }
        Err(CatalogError::Ambiguous {
            identifier: identifier.to_string(),
            matches: matches.len(),
        })
    }

    /// Duplicate groups among the catalogued files.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlite`] on database failure.
    pub fn duplicates(&self, grouped: bool) -> Result<Listing, CatalogError> {
        Ok(index::find_duplicates(&self.hash_records()?, grouped))
    }

    /// Groups with no copy under an archive directory.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Sqlite`] on database failure.
    pub fn idle(
        &self,
        grouped: bool,
        include_singletons: bool,
    ) -> Result<(Listing, Option<IndexWarning>), CatalogError> {
        let records = self.hash_records()?;
        let archive = self.archive_directories()?;
        Ok(index::find_idle(&records, &archive, grouped, include_singletons))
    }
}

/// BLAKE3 digest of a file, hex encoded.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be read.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE * 8];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_add_hashes_ignores_known_paths() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let added = catalog
            .add_hashes(&[HashRecord::new("/a", "h1"), HashRecord::new("/b", "h1")])
            .unwrap();
        assert_eq!(added, 2);
        let added = catalog
            .add_hashes(&[HashRecord::new("/a", "other"), HashRecord::new("/c", "h2")])
            .unwrap();
        assert_eq!(added, 1);
        let records = catalog.hash_records().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], HashRecord::new("/a", "h1"));
        assert_eq!(catalog.len().unwrap(), 3);
    }

    #[test]
    fn test_import_hashes_new_files_once() {
        let tmp = TempDir::new().unwrap();
        let pics = tmp.path().join("pics");
        fs::create_dir(&pics).unwrap();
        fs::write(pics.join("one.jpg"), b"same").unwrap();
        fs::write(pics.join("two.jpg"), b"same").unwrap();
        fs::write(pics.join("three.jpg"), b"other").unwrap();

        let mut catalog = Catalog::open(&tmp.path().join("db").join("catalog.db")).unwrap();
        let summary = catalog.import_paths(&[pics.clone()], Some(2)).unwrap();
        assert_eq!(summary.found, 3);
        assert_eq!(summary.added, 3);

        let again = catalog.import_paths(&[pics], Some(2)).unwrap();
        assert_eq!(again.known, 3);
        assert_eq!(again.added, 0);

        match catalog.duplicates(true).unwrap() {
            Listing::Grouped(groups) => {
                assert_eq!(groups.len(), 1);
                assert_eq!(groups[0].hash, blake3::hash(b"same").to_hex().to_string());
            }
            Listing::Flat(_) => panic!("Expected grouped listing"),
        }
    }

    #[test]
    fn test_tag_and_find() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        catalog
            .add_hashes(&[
                HashRecord::new("/home/pics/a.jpg", "abcdef"),
                HashRecord::new("/archive/2024/a.jpg", "abcdef"),
                HashRecord::new("/home/pics/b.jpg", "123456"),
            ])
            .unwrap();

        assert_eq!(catalog.find("b.jpg").unwrap(), Some("/home/pics/b.jpg".into()));
        assert_eq!(catalog.find("1234").unwrap(), Some("/home/pics/b.jpg".into()));
        assert_eq!(catalog.find("zzz").unwrap(), None);
        assert!(matches!(
            catalog.find("abc"),
            Err(CatalogError::Ambiguous { matches: 2, .. })
        ));

        catalog.tag_directory(Path::new("/archive"), "archive").unwrap();
        assert_eq!(catalog.archive_directories().unwrap(), vec![PathBuf::from("/archive")]);
        assert_eq!(catalog.find("abc").unwrap(), Some("/archive/2024/a.jpg".into()));

        let (idle, warning) = catalog.idle(true, false).unwrap();
        assert!(warning.is_none());
        assert!(idle.is_empty());
    }

    #[test]
    fn test_retag_replaces() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.tag_directory(Path::new("/x"), "archive").unwrap();
        catalog.tag_directory(Path::new("/x"), "local").unwrap();
        assert!(catalog.archive_directories().unwrap().is_empty());
        assert_eq!(catalog.directories("LOCAL").unwrap(), vec![PathBuf::from("/x")]);
    }
}
