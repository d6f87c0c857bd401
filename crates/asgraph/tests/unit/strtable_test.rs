//! Unit tests for string interning and key remapping.

use asgraph::strtable::pearson_hash;
use asgraph::{KeyMap, StrTable, StrType};

#[test]
fn test_intern_is_idempotent() {
    let mut table = StrTable::default();
    let a = table.intern("render");
    let b = table.intern("render");
    assert_eq!(a, b);
    assert_eq!(table.len(), 1);
    assert_eq!(table.resolve(a), "render");
}

#[test]
fn test_empty_string_is_key_zero() {
    let mut table = StrTable::default();
    assert_eq!(table.intern(""), 0);
    assert_eq!(table.resolve(0), "");
    assert!(table.is_empty());
}

#[test]
fn test_key_carries_pearson_hash() {
    let mut table = StrTable::new(16);
    let key = table.intern("console");
    assert_eq!((key >> 16) as u16, pearson_hash(b"console"));
    assert_ne!(key & 0xFFFF, 0);
}

#[test]
fn test_unknown_key_resolves_to_nothing() {
    let table = StrTable::default();
    assert_eq!(table.try_resolve(0xDEAD_BEEF), None);
    assert!(!table.contains(0xDEAD_BEEF));
}

#[test]
fn test_remap_into_is_idempotent() {
    let mut source = StrTable::default();
    let key = source.intern("shared");
    let mut target = StrTable::new(32);
    target.intern("already here");

    let mut map = KeyMap::new();
    let first = source.remap_into(key, &mut target, &mut map);
    let second = source.remap_into(key, &mut target, &mut map);
    assert_eq!(first, second);
    assert_eq!(target.resolve(first), "shared");
    assert_eq!(target.len(), 2);
    assert_eq!(map.get(&key), Some(&first));
}

#[test]
fn test_section_round_trip_keeps_counters() {
    let mut table = StrTable::new(8);
    let keep = table.intern_as("kept", StrType::ToSave);
    let drop = table.intern("dropped");

    let mut bytes = Vec::new();
    let written = table
        .write_to(&mut bytes, |_, ty| ty == StrType::ToSave)
        .unwrap();
    assert_eq!(written, 1);

    let mut loaded = StrTable::read_from(&mut bytes.as_slice()).unwrap();
    assert_eq!(loaded.resolve(keep), "kept");
    assert!(!loaded.contains(drop));
    // Counters survive, so a fresh intern never reuses a saved key.
    let again = loaded.intern("dropped");
    assert_ne!(again, keep);
}
