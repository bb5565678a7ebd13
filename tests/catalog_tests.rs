//! Integration tests for the hash catalog and its duplicate/idle queries.

use photoclassify::catalog::{
    find_duplicates, find_idle, hash_file, Catalog, CatalogError, DuplicateGroup, HashRecord,
    IndexWarning, Listing, ARCHIVE_TAG,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn three_records() -> Vec<HashRecord> {
    vec![
        HashRecord::new("/p1", "h1"),
        HashRecord::new("/p2", "h1"),
        HashRecord::new("/p3", "h2"),
    ]
}

// =============================================================================
// Pure queries
// =============================================================================

#[test]
fn test_duplicates_grouped_and_flat() {
    let records = three_records();

    let grouped = find_duplicates(&records, true);
    assert_eq!(
        grouped,
        Listing::Grouped(vec![DuplicateGroup {
            hash: "h1".into(),
            paths: vec![PathBuf::from("/p1"), PathBuf::from("/p2")],
        }])
    );

    let flat = find_duplicates(&records, false);
    assert_eq!(flat, Listing::Flat(vec![PathBuf::from("/p1"), PathBuf::from("/p2")]));
}

#[test]
fn test_idle_without_archive_flags_every_group() {
    let (idle, warning) = find_idle(&three_records(), &[], true, false);
    assert_eq!(warning, Some(IndexWarning::NoArchiveDirectories));
    assert_eq!(idle.len(), 1);

    let (idle, _) = find_idle(&three_records(), &[], true, true);
    assert_eq!(idle.len(), 2);
}

#[test]
fn test_idle_excludes_groups_with_an_archived_copy() {
    let records = vec![
        HashRecord::new("/home/me/a.jpg", "h1"),
        HashRecord::new("/srv/archive/2024/a.jpg", "h1"),
        HashRecord::new("/home/me/b.jpg", "h2"),
        HashRecord::new("/tmp/b.jpg", "h2"),
        HashRecord::new("/srv/archive-old/c.jpg", "h3"),
        HashRecord::new("/home/c.jpg", "h3"),
    ];
    let archive = vec![PathBuf::from("/srv/archive")];

    let (idle, warning) = find_idle(&records, &archive, true, false);
    assert_eq!(warning, None);
    match idle {
        Listing::Grouped(groups) => {
            let hashes: Vec<&str> = groups.iter().map(|g| g.hash.as_str()).collect();
            // "/srv/archive-old" is a sibling, not a child, of the archive
            assert_eq!(hashes, vec!["h2", "h3"]);
        }
        Listing::Flat(_) => panic!("Expected grouped listing"),
    }
}

// =============================================================================
// SQLite-backed catalog
// =============================================================================

#[test]
fn test_catalog_queries_match_pure_functions() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    assert_eq!(catalog.add_hashes(&three_records()).unwrap(), 3);
    // Re-adding is ignored
    assert_eq!(catalog.add_hashes(&three_records()).unwrap(), 0);
    assert_eq!(catalog.len().unwrap(), 3);
    assert_eq!(catalog.hash_records().unwrap(), three_records());

    assert_eq!(
        catalog.duplicates(true).unwrap(),
        find_duplicates(&three_records(), true)
    );
    let (idle, warning) = catalog.idle(true, false).unwrap();
    assert_eq!(warning, Some(IndexWarning::NoArchiveDirectories));
    assert_eq!(idle.len(), 1);

    catalog.tag_directory(&PathBuf::from("/p2"), "archive").unwrap();
    let (idle, warning) = catalog.idle(true, false).unwrap();
    assert_eq!(warning, None);
    assert!(idle.is_empty());
}

#[test]
fn test_tags_are_upper_case_and_latest_wins() {
    let catalog = Catalog::open_in_memory().unwrap();
    let dir = PathBuf::from("/srv/photos");
    catalog.tag_directory(&dir, "staging").unwrap();
    assert_eq!(catalog.directories("STAGING").unwrap(), vec![dir.clone()]);

    catalog.tag_directory(&dir, "archive").unwrap();
    assert!(catalog.directories("STAGING").unwrap().is_empty());
    assert_eq!(catalog.directories(ARCHIVE_TAG).unwrap(), vec![dir.clone()]);
    assert_eq!(catalog.archive_directories().unwrap(), vec![dir]);
}

#[test]
fn test_find_by_fragment_and_hash_prefix() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    catalog
        .add_hashes(&[
            HashRecord::new("/home/me/IMG_1.JPG", "abc123"),
            HashRecord::new("/srv/archive/IMG_1.JPG", "abc123"),
            HashRecord::new("/home/me/IMG_2.JPG", "def456"),
        ])
        .unwrap();

    assert_eq!(
        catalog.find("IMG_2").unwrap(),
        Some(PathBuf::from("/home/me/IMG_2.JPG"))
    );
    assert_eq!(
        catalog.find("def4").unwrap(),
        Some(PathBuf::from("/home/me/IMG_2.JPG"))
    );
    assert_eq!(catalog.find("nothing-like-this").unwrap(), None);

    match catalog.find("abc") {
        Err(CatalogError::Ambiguous { matches, .. }) => assert_eq!(matches, 2),
        other => panic!("Expected Ambiguous, got {other:?}"),
    }
    catalog
        .tag_directory(&PathBuf::from("/srv/archive"), "archive")
        .unwrap();
    assert_eq!(
        catalog.find("abc").unwrap(),
        Some(PathBuf::from("/srv/archive/IMG_1.JPG"))
    );
}

#[test]
fn test_import_hashes_new_files_once() {
    let dir = TempDir::new().unwrap();
    let pics = dir.path().join("pics");
    fs::create_dir_all(pics.join("sub")).unwrap();
    fs::write(pics.join("a.jpg"), b"same").unwrap();
    fs::write(pics.join("sub/b.jpg"), b"same").unwrap();
    fs::write(pics.join("c.jpg"), b"different").unwrap();

    let db = dir.path().join("state/catalog.db");
    let mut catalog = Catalog::open(&db).unwrap();
    let summary = catalog.import_paths(&[pics.clone()], Some(2)).unwrap();
    assert_eq!(summary.found, 3);
    assert_eq!(summary.added, 3);
    assert_eq!(summary.failed, 0);

    let expected = hash_file(&pics.join("a.jpg")).unwrap();
    match catalog.duplicates(true).unwrap() {
        Listing::Grouped(groups) => {
            assert_eq!(groups.len(), 1);
            assert_eq!(groups[0].hash, expected);
            assert_eq!(groups[0].paths.len(), 2);
        }
        Listing::Flat(_) => panic!("Expected grouped listing"),
    }
    drop(catalog);

    let mut reopened = Catalog::open(&db).unwrap();
    let again = reopened.import_paths(&[pics], None).unwrap();
    assert_eq!(again.known, 3);
    assert_eq!(again.added, 0);
}
