use chrono::{Duration, Utc};
use ledgerlite::collection::Collection;
use ledgerlite::config::StoreConfig;
use ledgerlite::errors::DbError;
use ledgerlite::query::{Patch, Query, UpdateOptions};
use ledgerlite::registry::{COLLECTIONS, EXPENSE_CATEGORIES, Registry, RegistryBuilder, SkipSeed};
use serde_json::{Value, json};
use tempfile::tempdir;

fn doc(v: Value) -> ledgerlite::types::Document {
    v.as_object().cloned().unwrap()
}

#[test]
fn test_registry_opens_every_collection() {
    let dir = tempdir().unwrap();
    let reg = Registry::open(&StoreConfig::for_dir(dir.path()), SkipSeed::No).unwrap();
    assert_eq!(reg.names().len(), COLLECTIONS.len());
    for name in COLLECTIONS {
        assert!(reg.is_registered(name));
        assert!(Collection::datafile_path(dir.path(), name).exists(), "{name} has no datafile");
    }
    assert!(reg.faults().is_empty());
}

#[test]
fn test_unknown_collection_is_rejected() {
    let dir = tempdir().unwrap();
    let reg = Registry::open(&StoreConfig::for_dir(dir.path()), SkipSeed::No).unwrap();
    let err = reg.find("ghosts", &Query::all()).unwrap_err();
    assert!(matches!(err, DbError::UnknownCollection(ref n) if n == "ghosts"));
    assert!(reg.insert("ghosts", doc(json!({"a": 1}))).is_err());
}

#[test]
fn test_empty_cash_ledger_gets_opening_balance() {
    let dir = tempdir().unwrap();
    let reg = Registry::open(&StoreConfig::for_dir(dir.path()), SkipSeed::No).unwrap();
    assert_eq!(reg.count("cashLedger", &Query::all()).unwrap(), 1);
    let row = reg.find_one("cashLedger", &Query::all()).unwrap().unwrap();
    assert_eq!(row.get("balance"), Some(&json!(0)));
    assert_eq!(row.get("description"), Some(&json!("Opening Balance")));
    assert_eq!(reg.count("bankLedger", &Query::all()).unwrap(), 1);
    assert_eq!(reg.count("expenseCategories", &Query::all()).unwrap(), EXPENSE_CATEGORIES.len());
    assert!(reg.seed_report().seeded.contains(&"cashLedger".to_string()));
}

#[test]
fn test_seeding_does_not_repeat_on_reopen() {
    let dir = tempdir().unwrap();
    let cfg = StoreConfig::for_dir(dir.path());
    drop(Registry::open(&cfg, SkipSeed::No).unwrap());
    let reg = Registry::open(&cfg, SkipSeed::No).unwrap();
    assert_eq!(reg.count("cashLedger", &Query::all()).unwrap(), 1);
    assert!(reg.seed_report().seeded.is_empty());
}

#[test]
fn test_seeding_skipped_while_marker_active() {
    let dir = tempdir().unwrap();
    let cfg = StoreConfig::for_dir(dir.path());
    let reg = Registry::open(&cfg, SkipSeed::Until(Utc::now() + Duration::seconds(30))).unwrap();
    assert!(reg.seed_report().skipped);
    assert_eq!(reg.count("cashLedger", &Query::all()).unwrap(), 0);
    drop(reg);

    // An expired marker no longer applies.
    let reg = Registry::open(&cfg, SkipSeed::Until(Utc::now() - Duration::seconds(1))).unwrap();
    assert!(!reg.seed_report().skipped);
    assert_eq!(reg.count("cashLedger", &Query::all()).unwrap(), 1);
}

#[test]
fn test_duplicate_business_id_updates_one() {
    let dir = tempdir().unwrap();
    let reg = Registry::open(&StoreConfig::for_dir(dir.path()), SkipSeed::No).unwrap();
    reg.insert("customers", doc(json!({"id": "C1", "name": "A"}))).unwrap();
    reg.insert("customers", doc(json!({"id": "C1", "name": "B"}))).unwrap();
    let n = reg
        .update(
            "customers",
            &Query::all().eq("id", "C1"),
            &Patch::set(doc(json!({"phone": "555"}))),
            UpdateOptions::default(),
        )
        .unwrap();
    assert_eq!(n, 1);
    assert_eq!(reg.count("customers", &Query::all().eq("phone", "555")).unwrap(), 1);
}

#[test]
fn test_damaged_collection_is_faulted_not_fatal() {
    let dir = tempdir().unwrap();
    std::fs::write(Collection::datafile_path(dir.path(), "tradePayable"), "garbage\nmore garbage\n").unwrap();
    let reg = Registry::open(&StoreConfig::for_dir(dir.path()), SkipSeed::No).unwrap();
    let faults = reg.faults();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].0, "tradePayable");
    assert!(matches!(reg.find("tradePayable", &Query::all()), Err(DbError::StorageFault(_))));
    assert_eq!(reg.count("customers", &Query::all()).unwrap(), 0);
}

#[test]
fn test_builder_registers_legacy_collections() {
    let dir = tempdir().unwrap();
    let cfg = StoreConfig::for_dir(dir.path());
    let reg = RegistryBuilder::new(&cfg)
        .with_collection("payables")
        .with_collection("payables")
        .open(SkipSeed::No)
        .unwrap();
    assert_eq!(reg.names().len(), COLLECTIONS.len() + 1);
    reg.insert("payables", doc(json!({"ref": "P1"}))).unwrap();
    assert_eq!(reg.count("payables", &Query::all()).unwrap(), 1);
}

#[test]
fn test_compact_all_reports_nothing_on_success() {
    let dir = tempdir().unwrap();
    let reg = Registry::open(&StoreConfig::for_dir(dir.path()), SkipSeed::No).unwrap();
    reg.insert("stock", doc(json!({"sku": "A"}))).unwrap();
    assert!(reg.compact_all().is_empty());
}
