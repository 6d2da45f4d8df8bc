use crate::types::Document;
use serde_json::Value;

use super::types::{MAX_PATH_DEPTH, MAX_PATH_LEN, Query};

pub fn matches(doc: &Document, query: &Query) -> bool {
    query.clauses.iter().all(|(path, expected)| {
        get_path(doc, path).is_some_and(|actual| values_equal(actual, expected))
    })
}

/// Resolve a dotted path. Missing segments and non-object intermediates yield `None`.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    if path.is_empty() || path.len() > MAX_PATH_LEN {
        return None;
    }
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH {
            return None;
        }
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}

/// JSON equality where numbers compare by value, so `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => match (x.as_f64(), y.as_f64()) {
                (Some(f), Some(g)) => f == g,
                _ => x == y,
            },
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm.iter().all(|(k, x)| ym.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}
