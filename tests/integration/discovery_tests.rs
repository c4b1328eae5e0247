use super::fixtures::{halo_table, write_catalog, Fixture};
use halocache::cache::{CacheLogEntry, HaloTableCache, InspectionFailure};
use std::fs;
use std::path::Path;

#[test]
fn test_discover_adds_valid_catalogs() {
    let fx = Fixture::new();
    let mut cache = fx.empty_cache();

    let report = cache.discover(fx.path(), true).unwrap();

    assert_eq!(
        report.added,
        vec![fx.good_log_entry.clone(), fx.good_log_entry2.clone()]
    );
    assert_eq!(report.already_present, 0);
    assert_eq!(
        report.rejected,
        vec![(
            fx.bad_table_fname.clone(),
            InspectionFailure::MissingColumns(vec!["halo_x".to_string()])
        )]
    );
    assert!(report.invalid.is_empty());

    let reloaded = HaloTableCache::new(true, Some(fx.log_path())).unwrap();
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn test_discover_is_idempotent() {
    let fx = Fixture::new();
    let mut cache = fx.empty_cache();
    cache.discover(fx.path(), false).unwrap();

    let report = cache.discover(fx.path(), false).unwrap();
    assert!(report.added.is_empty());
    assert_eq!(report.already_present, 2);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_discover_walks_subdirectories_and_skips_other_files() {
    let fx = Fixture::new();
    let nested = fx.path().join("bolshoi").join("rockstar");
    fs::create_dir_all(&nested).unwrap();

    let path = nested.join("hlist_1.00000.hdf5");
    let entry = CacheLogEntry::new(
        "bolshoi",
        "rockstar",
        "v1",
        "0.0000",
        path.to_string_lossy(),
    );
    write_catalog(&path, halo_table(), &entry);
    fs::write(nested.join("README.txt"), "notes").unwrap();
    fs::write(nested.join("corrupt.hdf5"), "garbage").unwrap();

    let mut cache = fx.empty_cache();
    let report = cache.discover(&fx.path().join("bolshoi"), false).unwrap();

    assert_eq!(report.added, vec![entry]);
    assert_eq!(report.rejected.len(), 1);
    assert!(matches!(
        report.rejected[0].1,
        InspectionFailure::Unreadable(_)
    ));
}

#[test]
fn test_discover_reports_unloggable_metadata() {
    let fx = Fixture::new();
    let path = fx.path().join("unversioned.hdf5");
    let entry = CacheLogEntry::new("bolshoi", "rockstar", "", "0.0000", path.to_string_lossy());
    write_catalog(&path, halo_table(), &entry);

    let mut cache = fx.empty_cache();
    let report = cache.discover(fx.path(), false).unwrap();

    assert_eq!(report.invalid.len(), 1);
    assert_eq!(report.invalid[0].0, path);
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_discover_logs_metadata_with_spaces() {
    let fx = Fixture::new();
    let nested = fx.path().join("Application Support");
    fs::create_dir_all(&nested).unwrap();
    let path = nested.join("my halos.hdf5");
    let entry = CacheLogEntry::new(
        "my simulation",
        "rockstar",
        "v1",
        "0.0000",
        path.to_string_lossy(),
    );
    write_catalog(&path, halo_table(), &entry);

    let mut cache = fx.empty_cache();
    let report = cache.discover(&nested, true).unwrap();
    assert_eq!(report.added, vec![entry.clone()]);

    let reloaded = HaloTableCache::new(true, Some(fx.log_path())).unwrap();
    assert_eq!(reloaded.log(), &[entry]);
}

#[test]
fn test_discover_under_relative_root_logs_absolute_paths() {
    let scratch = tempfile::Builder::new()
        .prefix("discover-rel")
        .tempdir_in(".")
        .unwrap();
    // The scratch directory sits in the current directory.
    let root = Path::new(scratch.path().file_name().unwrap()).join("cats");
    assert!(root.is_relative());
    fs::create_dir_all(&root).unwrap();
    write_catalog(
        &root.join("a.hdf5"),
        halo_table(),
        &CacheLogEntry::new("v", "v", "v", "0.0000", "unused"),
    );

    let log_path = scratch.path().join("cache_log.txt");
    let mut cache = HaloTableCache::new(false, Some(log_path.clone())).unwrap();
    let report = cache.discover(&root, true).unwrap();

    assert_eq!(report.added.len(), 1);
    let expected = std::env::current_dir().unwrap().join(&root).join("a.hdf5");
    let logged = HaloTableCache::new(true, Some(log_path)).unwrap();
    let fname = logged.log()[0].path();
    assert!(fname.is_absolute(), "{}", fname.display());
    assert_eq!(fname, expected);
    assert!(logged.stale_entries().is_empty());
}
