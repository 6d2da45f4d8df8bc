use ledgerlite::collection::{Collection, CollectionOptions};
use ledgerlite::errors::DbError;
use ledgerlite::query::{Patch, Query, RemoveOptions, UpdateOptions, parse_patch_json};
use ledgerlite::types::{Document, ID_FIELD};
use serde_json::{Value, json};
use std::io::Write;
use tempfile::tempdir;

fn doc(v: Value) -> Document {
    match v {
        Value::Object(m) => m,
        _ => panic!("not an object"),
    }
}

fn open(dir: &std::path::Path) -> Collection {
    Collection::open("customers", dir, CollectionOptions::default()).unwrap()
}

#[test]
fn test_insert_assigns_id_and_round_trips() {
    let dir = tempdir().unwrap();
    let col = open(dir.path());
    let stored = col.insert(doc(json!({"id": "C1", "name": "Ada"}))).unwrap();
    let id = stored.get(ID_FIELD).and_then(Value::as_str).unwrap().to_string();
    assert!(!id.is_empty());
    let found = col.find_one(&Query::all().eq(ID_FIELD, id.as_str())).unwrap();
    assert_eq!(found, stored);
}

#[test]
fn test_duplicate_explicit_id_is_rejected() {
    let dir = tempdir().unwrap();
    let col = open(dir.path());
    col.insert(doc(json!({"_id": "x1", "n": 1}))).unwrap();
    let err = col.insert(doc(json!({"_id": "x1", "n": 2}))).unwrap_err();
    assert!(matches!(err, DbError::DuplicateId(ref id) if id == "x1"));
    assert_eq!(col.len(), 1);
}

#[test]
fn test_find_preserves_insertion_order() {
    let dir = tempdir().unwrap();
    let col = open(dir.path());
    for n in 0..5 {
        col.insert(doc(json!({"n": n, "even": n % 2 == 0}))).unwrap();
    }
    let evens: Vec<i64> = col
        .find(&Query::all().eq("even", true))
        .iter()
        .filter_map(|d| d.get("n").and_then(Value::as_i64))
        .collect();
    assert_eq!(evens, vec![0, 2, 4]);
    assert_eq!(col.count(&Query::all()), 5);
}

#[test]
fn test_update_single_touches_first_match_only() {
    let dir = tempdir().unwrap();
    let col = open(dir.path());
    col.insert(doc(json!({"id": "C1", "name": "first"}))).unwrap();
    col.insert(doc(json!({"id": "C1", "name": "second"}))).unwrap();
    let patch = Patch::set(doc(json!({"phone": "555"})));
    let n = col.update(&Query::all().eq("id", "C1"), &patch, UpdateOptions::default()).unwrap();
    assert_eq!(n, 1);
    let with_phone = col.count(&Query::all().eq("phone", "555"));
    assert_eq!(with_phone, 1);
    let first = col.find_one(&Query::all().eq("name", "first")).unwrap();
    assert_eq!(first.get("phone"), Some(&json!("555")));
}

#[test]
fn test_update_multi_and_upsert() {
    let dir = tempdir().unwrap();
    let col = open(dir.path());
    col.insert(doc(json!({"kind": "a"}))).unwrap();
    col.insert(doc(json!({"kind": "a"}))).unwrap();
    let patch = parse_patch_json(r#"{"$inc": {"hits": 1}}"#).unwrap();
    let n = col.update(&Query::all().eq("kind", "a"), &patch, UpdateOptions::multi()).unwrap();
    assert_eq!(n, 2);
    assert_eq!(col.count(&Query::all().eq("hits", 1)), 2);

    let none = col.update(&Query::all().eq("kind", "b"), &patch, UpdateOptions::default()).unwrap();
    assert_eq!(none, 0);
    let upserted = col
        .update(&Query::all().eq("kind", "b"), &patch, UpdateOptions { multi: false, upsert: true })
        .unwrap();
    assert_eq!(upserted, 1);
    let b = col.find_one(&Query::all().eq("kind", "b")).unwrap();
    assert_eq!(b.get("hits"), Some(&json!(1)));
    assert!(b.contains_key(ID_FIELD));
}

#[test]
fn test_failed_patch_leaves_documents_untouched() {
    let dir = tempdir().unwrap();
    let col = open(dir.path());
    col.insert(doc(json!({"k": 1, "label": "text"}))).unwrap();
    let patch = parse_patch_json(r#"{"$inc": {"label": 1}}"#).unwrap();
    assert!(col.update(&Query::all(), &patch, UpdateOptions::default()).is_err());
    let d = col.find_one(&Query::all()).unwrap();
    assert_eq!(d.get("label"), Some(&json!("text")));
}

#[test]
fn test_remove_single_and_multi() {
    let dir = tempdir().unwrap();
    let col = open(dir.path());
    for _ in 0..3 {
        col.insert(doc(json!({"tag": "x"}))).unwrap();
    }
    assert_eq!(col.remove(&Query::all().eq("tag", "x"), RemoveOptions::default()).unwrap(), 1);
    assert_eq!(col.remove(&Query::all().eq("tag", "x"), RemoveOptions::multi()).unwrap(), 2);
    assert_eq!(col.remove(&Query::all(), RemoveOptions::multi()).unwrap(), 0);
    assert!(col.is_empty());
}

#[test]
fn test_reopen_restores_contents() {
    let dir = tempdir().unwrap();
    let before = {
        let col = open(dir.path());
        col.insert(doc(json!({"id": "C1", "name": "Ada"}))).unwrap();
        col.insert(doc(json!({"id": "C2", "name": "Bob"}))).unwrap();
        col.update(
            &Query::all().eq("id", "C2"),
            &Patch::set(doc(json!({"name": "Bobby"}))),
            UpdateOptions::default(),
        )
        .unwrap();
        col.remove(&Query::all().eq("id", "C1"), RemoveOptions::default()).unwrap();
        col.find(&Query::all())
    };
    let col = open(dir.path());
    assert_eq!(col.find(&Query::all()), before);
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].get("name"), Some(&json!("Bobby")));
}

#[test]
fn test_clear_empties_collection_on_disk() {
    let dir = tempdir().unwrap();
    {
        let col = open(dir.path());
        col.insert(doc(json!({"a": 1}))).unwrap();
        col.insert(doc(json!({"a": 2}))).unwrap();
        assert_eq!(col.clear().unwrap(), 2);
        assert_eq!(col.clear().unwrap(), 0);
    }
    assert!(open(dir.path()).is_empty());
}

#[test]
fn test_damaged_line_below_threshold_is_skipped() {
    let dir = tempdir().unwrap();
    {
        let col = open(dir.path());
        for n in 0..20 {
            col.insert(doc(json!({"n": n}))).unwrap();
        }
    }
    let path = Collection::datafile_path(dir.path(), "customers");
    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(f, "deadbeef {{\"op\":\"insert\",\"doc\":{{\"n\":99}}}}").unwrap();
    drop(f);

    let col = open(dir.path());
    assert_eq!(col.len(), 20);
    assert_eq!(col.count(&Query::all().eq("n", 99)), 0);
}

#[test]
fn test_damage_above_threshold_is_a_storage_fault() {
    let dir = tempdir().unwrap();
    {
        let col = open(dir.path());
        col.insert(doc(json!({"n": 1}))).unwrap();
    }
    let path = Collection::datafile_path(dir.path(), "customers");
    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(f, "not a record").unwrap();
    writeln!(f, "also not a record").unwrap();
    drop(f);

    let err = Collection::open("customers", dir.path(), CollectionOptions::default()).unwrap_err();
    assert!(matches!(err, DbError::StorageFault(_)));
}

#[test]
fn test_compact_keeps_live_documents() {
    let dir = tempdir().unwrap();
    let opts = CollectionOptions { autocompact_after: 0, ..CollectionOptions::default() };
    {
        let col = Collection::open("stock", dir.path(), opts.clone()).unwrap();
        for n in 0..10 {
            col.insert(doc(json!({"n": n}))).unwrap();
        }
        col.remove(&Query::all(), RemoveOptions::multi()).unwrap();
        col.insert(doc(json!({"n": 42}))).unwrap();
        col.compact().unwrap();
    }
    let text = std::fs::read_to_string(Collection::datafile_path(dir.path(), "stock")).unwrap();
    assert_eq!(text.lines().count(), 1);
    let col = Collection::open("stock", dir.path(), opts).unwrap();
    assert_eq!(col.find_one(&Query::all()).unwrap().get("n"), Some(&json!(42)));
}

#[test]
fn test_non_utf8_line_counts_as_damage() {
    let dir = tempdir().unwrap();
    {
        let col = Collection::open("bills", dir.path(), CollectionOptions::default()).unwrap();
        for n in 0..30 {
            col.insert(doc(json!({"n": n}))).unwrap();
        }
    }
    let path = Collection::datafile_path(dir.path(), "bills");
    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(&[0xff, 0xfe, b'\n']).unwrap();
    drop(f);

    let col = Collection::open("bills", dir.path(), CollectionOptions::default()).unwrap();
    assert_eq!(col.len(), 30);
    assert!(dir.path().join("bills.db.corrupt").exists());
}

#[test]
fn test_torn_final_append_is_dropped_on_reopen() {
    let dir = tempdir().unwrap();
    let path = Collection::datafile_path(dir.path(), "cashLedger");
    {
        let col = Collection::open("cashLedger", dir.path(), CollectionOptions::default()).unwrap();
        for n in 0..5 {
            col.insert(doc(json!({"n": n}))).unwrap();
        }
    }
    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(br#"0badc0de {"op":"insert","doc":{"_id":"half","#).unwrap();
    drop(f);

    {
        let col = Collection::open("cashLedger", dir.path(), CollectionOptions::default()).unwrap();
        assert_eq!(col.len(), 5);
        col.insert(doc(json!({"n": 5}))).unwrap();
    }
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("half"));
    let col = Collection::open("cashLedger", dir.path(), CollectionOptions::default()).unwrap();
    assert_eq!(col.len(), 6);
    assert_eq!(col.count(&Query::all().eq("n", 5)), 1);
}

#[test]
fn test_replacement_upsert_keeps_query_fields() {
    let dir = tempdir().unwrap();
    let col = open(dir.path());
    let patch = parse_patch_json(r#"{"name": "Ada", "phone": "555"}"#).unwrap();
    let n = col
        .update(&Query::all().eq("id", "C9"), &patch, UpdateOptions { multi: false, upsert: true })
        .unwrap();
    assert_eq!(n, 1);
    let stored = col.find_one(&Query::all().eq("id", "C9")).unwrap();
    assert_eq!(stored.get("name"), Some(&json!("Ada")));
    assert_eq!(stored.get("phone"), Some(&json!("555")));
}
