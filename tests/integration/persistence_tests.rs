use super::fixtures::Fixture;
use halocache::cache::{ascii::HEADER, CacheError, HaloTableCache, RemoveOptions};
use halocache::config::CacheConfig;
use std::fs;

#[test]
fn test_round_trip_through_ascii_log() {
    let fx = Fixture::new();
    let mut cache = fx.empty_cache();
    cache.add_entry(fx.good_log_entry2.clone(), true).unwrap();
    cache.add_entry(fx.good_log_entry.clone(), true).unwrap();

    let reloaded = HaloTableCache::new(true, Some(fx.log_path())).unwrap();
    assert_eq!(reloaded.log(), cache.log());
    assert_eq!(reloaded.log()[0], fx.good_log_entry2);
}

#[test]
fn test_ascii_log_is_overwritten_in_full() {
    let fx = Fixture::new();
    let mut cache = fx.empty_cache();
    cache.add_entry(fx.good_log_entry.clone(), true).unwrap();
    cache.add_entry(fx.good_log_entry2.clone(), true).unwrap();
    cache
        .remove_entry(&fx.good_log_entry, RemoveOptions::default())
        .unwrap();

    let text = fs::read_to_string(fx.log_path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec![HEADER.to_string(), fx.good_log_entry2.to_string()]);
}

#[test]
fn test_suppressed_sync_leaves_log_untouched() {
    let fx = Fixture::new();
    let mut cache = fx.empty_cache();
    cache.add_entry(fx.good_log_entry.clone(), true).unwrap();
    cache.add_entry(fx.good_log_entry2.clone(), false).unwrap();

    let on_disk = HaloTableCache::new(true, Some(fx.log_path())).unwrap();
    assert_eq!(on_disk.len(), 1);

    cache.write_ascii().unwrap();
    let on_disk = HaloTableCache::new(true, Some(fx.log_path())).unwrap();
    assert_eq!(on_disk.len(), 2);
}

#[test]
fn test_relocation_is_persisted() {
    let fx = Fixture::new();
    let mut cache = fx.empty_cache();
    cache.add_entry(fx.good_log_entry.clone(), true).unwrap();

    let new_path = fx.path().join("moved.hdf5");
    fs::rename(fx.good_log_entry.path(), &new_path).unwrap();
    let new_fname = new_path.to_string_lossy().into_owned();
    cache
        .update_cached_file_location(&new_fname, &fx.good_log_entry.fname, true)
        .unwrap();

    let reloaded = HaloTableCache::new(true, Some(fx.log_path())).unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.log()[0].fname, new_fname);
}

#[test]
fn test_reload_picks_up_external_edits() {
    let fx = Fixture::new();
    let mut cache = fx.empty_cache();
    cache.add_entry(fx.good_log_entry.clone(), true).unwrap();

    let mut other = HaloTableCache::new(true, Some(fx.log_path())).unwrap();
    other.add_entry(fx.good_log_entry2.clone(), true).unwrap();

    assert_eq!(cache.len(), 1);
    cache.reload().unwrap();
    assert_eq!(cache.log(), other.log());
}

#[test]
fn test_malformed_log_fails_loudly() {
    let fx = Fixture::new();
    fs::write(
        fx.log_path(),
        format!("{HEADER}\n{}\nonly three fields\n", fx.good_log_entry),
    )
    .unwrap();

    let err = HaloTableCache::new(true, Some(fx.log_path())).unwrap_err();
    assert!(matches!(err, CacheError::MalformedLog { line: 3, .. }));
}

#[test]
fn test_repeated_log_lines_are_dropped_on_load() {
    let fx = Fixture::new();
    let line = fx.good_log_entry.to_string();
    fs::write(fx.log_path(), format!("{line}\n{line}\n")).unwrap();

    let cache = HaloTableCache::new(true, Some(fx.log_path())).unwrap();
    assert_eq!(cache.log(), &[fx.good_log_entry.clone()]);
}

#[test]
fn test_missing_log_starts_empty() {
    let fx = Fixture::new();
    let cache = HaloTableCache::new(true, Some(fx.log_path())).unwrap();
    assert!(cache.is_empty());
    assert!(!fx.log_path().exists());
}

#[test]
fn test_from_config() {
    let fx = Fixture::new();
    let mut cache = fx.empty_cache();
    cache.add_entry(fx.good_log_entry.clone(), true).unwrap();

    let config = CacheConfig {
        cache_log_fname: Some(fx.log_path()),
        ..CacheConfig::default()
    };
    assert_eq!(HaloTableCache::from_config(&config).unwrap().len(), 1);

    let config = CacheConfig {
        read_log_on_open: false,
        ..config
    };
    assert!(HaloTableCache::from_config(&config).unwrap().is_empty());
}
