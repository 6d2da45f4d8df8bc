use ledgerlite::bridge::{Bridge, Request, Response, dispatch_json};
use ledgerlite::config::StoreConfig;
use ledgerlite::errors::DbError;
use ledgerlite::query::{Patch, Query, RemoveOptions, UpdateOptions};
use ledgerlite::registry::{Registry, SkipSeed};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::tempdir;

fn doc(v: Value) -> ledgerlite::types::Document {
    v.as_object().cloned().unwrap()
}

fn registry(dir: &std::path::Path) -> Arc<Registry> {
    Arc::new(Registry::open(&StoreConfig::for_dir(dir), SkipSeed::No).unwrap())
}

#[tokio::test]
async fn test_bridge_crud_round_trip() {
    let dir = tempdir().unwrap();
    let bridge = Bridge::spawn(registry(dir.path()));
    let client = bridge.client();

    let stored = client.insert("customers", doc(json!({"id": "C1", "name": "Ada"}))).await.unwrap();
    assert!(stored.contains_key("_id"));

    let all = client.get("customers", Query::all()).await.unwrap();
    assert_eq!(all, vec![stored.clone()]);

    let n = client
        .update(
            "customers",
            Query::all().eq("id", "C1"),
            Patch::set(doc(json!({"phone": "555"}))),
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(n, 1);
    let one = client.get_one("customers", Query::all().eq("phone", "555")).await.unwrap();
    assert_eq!(one.and_then(|d| d.get("name").cloned()), Some(json!("Ada")));

    assert_eq!(client.count("customers", Query::all()).await.unwrap(), 1);
    assert_eq!(client.remove("customers", Query::all(), RemoveOptions::multi()).await.unwrap(), 1);
    assert_eq!(client.count("customers", Query::all()).await.unwrap(), 0);

    drop(client);
    bridge.join().await;
}

#[tokio::test]
async fn test_bridge_reports_operation_errors() {
    let dir = tempdir().unwrap();
    let bridge = Bridge::spawn(registry(dir.path()));
    let client = bridge.client();
    let err = client.get("ghosts", Query::all()).await.unwrap_err();
    assert!(matches!(err, DbError::UnknownCollection(_)));
    let none = client.get_one("customers", Query::all().eq("id", "nope")).await.unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_concurrent_inserts_all_land() {
    let dir = tempdir().unwrap();
    let bridge = Bridge::spawn(registry(dir.path()));
    let mut handles = Vec::new();
    for n in 0..32 {
        let client = bridge.client();
        handles.push(tokio::spawn(async move {
            client.insert("receipts", doc(json!({"n": n}))).await.map(|_| ())
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert_eq!(bridge.client().count("receipts", Query::all()).await.unwrap(), 32);
}

#[tokio::test]
async fn test_call_after_shutdown_is_bridge_closed() {
    let dir = tempdir().unwrap();
    let bridge = Bridge::spawn(registry(dir.path()));
    let client = bridge.client();
    let req = Request::Count { collection: "bills".into(), query: Query::all() };
    assert_eq!(client.call(req.clone()).await.unwrap(), Response::Count(0));
    bridge.shutdown().await;
    assert!(matches!(client.call(req).await, Err(DbError::BridgeClosed)));
}

#[test]
fn test_dispatch_json_envelopes() {
    let dir = tempdir().unwrap();
    let reg = registry(dir.path());
    let ok = dispatch_json(&reg, r#"{"op":"count","collection":"cashLedger"}"#);
    assert_eq!(serde_json::from_str::<Value>(&ok).unwrap(), json!({"ok": 1}));

    let err = dispatch_json(&reg, r#"{"op":"count","collection":"ghosts"}"#);
    let v: Value = serde_json::from_str(&err).unwrap();
    assert_eq!(v["error"]["kind"], json!("UnknownCollection"));

    let bad = dispatch_json(&reg, r#"{"op":"explode"}"#);
    let v: Value = serde_json::from_str(&bad).unwrap();
    assert_eq!(v["error"]["kind"], json!("Json"));
}
