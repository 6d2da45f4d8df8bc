use ledgerlite::collection::{Collection, CollectionOptions};
use ledgerlite::query::{Query, RemoveOptions};
use ledgerlite::types::{Document, ID_FIELD};
use proptest::prelude::*;
use serde_json::{Value, json};

fn row(tag: u8, n: i64) -> Document {
    json!({"tag": format!("t{tag}"), "n": n}).as_object().cloned().unwrap()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        cases: 48,
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        .. proptest::test_runner::Config::default()
    })]

    // count(Q) always agrees with find(Q).len(), including after removals.
    #[test]
    fn prop_count_matches_find(rows in proptest::collection::vec((0u8..4, -50i64..50), 0..40), probe in 0u8..4, drop_tag in 0u8..4) {
        let dir = tempfile::tempdir().unwrap();
        let col = Collection::open("stock", dir.path(), CollectionOptions::default()).unwrap();
        for (tag, n) in &rows {
            col.insert(row(*tag, *n)).unwrap();
        }
        let q = Query::all().eq("tag", format!("t{probe}"));
        prop_assert_eq!(col.count(&q), col.find(&q).len());
        prop_assert_eq!(col.count(&Query::all()), rows.len());

        col.remove(&Query::all().eq("tag", format!("t{drop_tag}")), RemoveOptions::multi()).unwrap();
        prop_assert_eq!(col.count(&q), col.find(&q).len());
    }

    // Every inserted document is found again by its _id, before and after reopening.
    #[test]
    fn prop_insert_round_trip(rows in proptest::collection::vec((0u8..4, any::<i64>()), 1..20)) {
        let dir = tempfile::tempdir().unwrap();
        let stored: Vec<Document> = {
            let col = Collection::open("bills", dir.path(), CollectionOptions::default()).unwrap();
            rows.iter().map(|(t, n)| col.insert(row(*t, *n)).unwrap()).collect()
        };
        let col = Collection::open("bills", dir.path(), CollectionOptions::default()).unwrap();
        for d in &stored {
            let id = d.get(ID_FIELD).cloned().unwrap_or(Value::Null);
            let found = col.find_one(&Query::all().eq(ID_FIELD, id));
            prop_assert_eq!(found.as_ref(), Some(d));
        }
    }
}
