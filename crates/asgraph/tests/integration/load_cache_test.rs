//! Reload cache behaviour against files on disk.

use asgraph::schema::demo;
use asgraph::{Factory, LoadCache};
use std::fs::File;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

#[test]
fn test_cache_reloads_changed_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.jsi");
    let js = demo::javascript().unwrap();

    let mut f = Factory::new(js.schema.clone());
    let first = f.create(js.identifier).unwrap();
    f.save_to_path(&path).unwrap();
    let past = SystemTime::now() - Duration::from_secs(120);
    File::options().write(true).open(&path).unwrap().set_modified(past).unwrap();

    let mut cache = LoadCache::new(js.schema.clone());
    assert!(cache.get(&path).unwrap().exists(first));

    let second = f.create(js.literal).unwrap();
    f.save_to_path(&path).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now())
        .unwrap();

    let loaded = cache.get(&path).unwrap();
    assert!(loaded.exists(second));
}

#[test]
fn test_cache_switches_paths() {
    let dir = TempDir::new().unwrap();
    let js = demo::javascript().unwrap();
    let a = dir.path().join("a.jsi");
    let b = dir.path().join("b.jsi");

    let mut fa = Factory::new(js.schema.clone());
    let only_in_a = fa.create(js.comment).unwrap();
    fa.save_to_path(&a).unwrap();
    Factory::new(js.schema.clone()).save_to_path(&b).unwrap();

    let mut cache = LoadCache::new(js.schema.clone());
    assert!(cache.get(&a).unwrap().exists(only_in_a));
    assert!(!cache.get(&b).unwrap().exists(only_in_a));
    assert!(cache.is_cached(&b));
    assert!(!cache.is_cached(&a));
}
