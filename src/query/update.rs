use crate::errors::DbError;
use crate::types::{Document, ID_FIELD};
use serde_json::{Map, Number, Value};

use super::types::{Modifiers, Patch};

/// Apply a patch in place. Returns whether the document changed.
///
/// # Errors
/// `InvalidPatch` when a replacement tries to change `_id`, `$inc` targets a
/// non-number, or `$push` targets a non-array. The document is left untouched.
pub fn apply_patch(doc: &mut Document, patch: &Patch) -> Result<bool, DbError> {
    let mut next = doc.clone();
    match patch {
        Patch::Replace(fields) => {
            if let Some(new_id) = fields.get(ID_FIELD)
                && doc.get(ID_FIELD) != Some(new_id)
            {
                return Err(DbError::InvalidPatch(format!("cannot change {ID_FIELD}")));
            }
            next = fields.clone();
            if let Some(id) = doc.get(ID_FIELD) {
                next.insert(ID_FIELD.to_string(), id.clone());
            }
        }
        Patch::Modify(m) => apply_modifiers(&mut next, m)?,
    }
    let changed = next != *doc;
    *doc = next;
    Ok(changed)
}

fn apply_modifiers(doc: &mut Document, m: &Modifiers) -> Result<(), DbError> {
    for (path, value) in &m.set {
        set_path(doc, path, value.clone());
    }
    for path in &m.unset {
        unset_path(doc, path);
    }
    for (path, by) in &m.inc {
        let current = super::eval::get_path(doc, path).cloned();
        let next = match current {
            None | Some(Value::Null) => Value::Number(by.clone()),
            Some(Value::Number(n)) => Value::Number(add_numbers(&n, by)),
            Some(_) => {
                return Err(DbError::InvalidPatch(format!("$inc target is not a number: {path}")));
            }
        };
        set_path(doc, path, next);
    }
    for (path, item) in &m.push {
        let mut arr = match super::eval::get_path(doc, path).cloned() {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(a)) => a,
            Some(_) => {
                return Err(DbError::InvalidPatch(format!("$push target is not an array: {path}")));
            }
        };
        arr.push(item.clone());
        set_path(doc, path, Value::Array(arr));
    }
    Ok(())
}

fn add_numbers(a: &Number, b: &Number) -> Number {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64())
        && let Some(sum) = x.checked_add(y)
    {
        return Number::from(sum);
    }
    let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
    Number::from_f64(sum).unwrap_or_else(|| Number::from(0))
}

/// Set a dotted path, creating (or overwriting non-object) intermediates.
pub(crate) fn set_path(doc: &mut Document, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else { return };
    let mut cur = doc;
    for part in parts {
        let slot = cur.entry(part.to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else { return };
        cur = next;
    }
    cur.insert(last.to_string(), value);
}

fn unset_path(doc: &mut Document, path: &str) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else { return };
    let mut cur = doc;
    for part in parts {
        match cur.get_mut(part) {
            Some(Value::Object(next)) => cur = next,
            _ => return,
        }
    }
    cur.remove(last);
}
