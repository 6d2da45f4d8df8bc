use crate::document::kind_name;
use crate::errors::DbError;
use crate::types::{Document, ID_FIELD};
use serde_json::{Map, Value};

use super::types::{MAX_CLAUSES, MAX_PATH_DEPTH, MAX_PATH_LEN, Modifiers, Patch, Query};

fn check_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("empty field path".into());
    }
    if path.len() > MAX_PATH_LEN || path.split('.').count() > MAX_PATH_DEPTH {
        return Err(format!("field path too long: {path}"));
    }
    if path.split('.').any(str::is_empty) {
        return Err(format!("malformed field path: {path}"));
    }
    Ok(())
}

impl TryFrom<Value> for Query {
    type Error = DbError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        let obj = match v {
            Value::Object(m) => m,
            // `null` is accepted as the empty query, like an omitted argument
            Value::Null => return Ok(Query::all()),
            other => {
                return Err(DbError::InvalidQuery(format!(
                    "query must be an object, got {}",
                    kind_name(&other)
                )));
            }
        };
        if obj.len() > MAX_CLAUSES {
            return Err(DbError::InvalidQuery(format!("too many clauses: {}", obj.len())));
        }
        let mut clauses = Vec::with_capacity(obj.len());
        for (k, val) in obj {
            if k.starts_with('$') {
                return Err(DbError::InvalidQuery(format!("operators are not supported: {k}")));
            }
            check_path(&k).map_err(DbError::InvalidQuery)?;
            clauses.push((k, val));
        }
        Ok(Query { clauses })
    }
}

impl From<Query> for Value {
    fn from(q: Query) -> Self {
        Value::Object(q.clauses.into_iter().collect())
    }
}

fn modifier_fields(op: &str, v: Value) -> Result<Map<String, Value>, DbError> {
    match v {
        Value::Object(m) => {
            for k in m.keys() {
                check_path(k).map_err(DbError::InvalidPatch)?;
                if k == ID_FIELD || k.starts_with("_id.") {
                    return Err(DbError::InvalidPatch(format!("{op} cannot modify {ID_FIELD}")));
                }
            }
            Ok(m)
        }
        other => Err(DbError::InvalidPatch(format!(
            "{op} expects an object, got {}",
            kind_name(&other)
        ))),
    }
}

impl TryFrom<Value> for Patch {
    type Error = DbError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        let obj = match v {
            Value::Object(m) => m,
            other => {
                return Err(DbError::InvalidPatch(format!(
                    "patch must be an object, got {}",
                    kind_name(&other)
                )));
            }
        };
        let dollar = obj.keys().filter(|k| k.starts_with('$')).count();
        if dollar == 0 {
            return Ok(Patch::Replace(obj));
        }
        if dollar != obj.len() {
            return Err(DbError::InvalidPatch("cannot mix modifiers and plain fields".into()));
        }
        let mut out = Modifiers::default();
        for (op, body) in obj {
            let fields = modifier_fields(&op, body)?;
            match op.as_str() {
                "$set" => out.set.extend(fields),
                "$unset" => out.unset.extend(fields.into_iter().map(|(k, _)| k)),
                "$inc" => {
                    for (k, n) in fields {
                        match n {
                            Value::Number(n) => out.inc.push((k, n)),
                            _ => {
                                return Err(DbError::InvalidPatch(format!("$inc requires numeric: {k}")));
                            }
                        }
                    }
                }
                "$push" => out.push.extend(fields),
                _ => return Err(DbError::InvalidPatch(format!("unknown modifier {op}"))),
            }
        }
        Ok(Patch::Modify(out))
    }
}

impl From<Patch> for Value {
    fn from(p: Patch) -> Self {
        match p {
            Patch::Replace(doc) => Value::Object(doc),
            Patch::Modify(m) => {
                let mut out = Map::new();
                if !m.set.is_empty() {
                    out.insert("$set".into(), Value::Object(m.set.into_iter().collect()));
                }
                if !m.unset.is_empty() {
                    let fields = m.unset.into_iter().map(|k| (k, Value::Bool(true))).collect();
                    out.insert("$unset".into(), Value::Object(fields));
                }
                if !m.inc.is_empty() {
                    let fields = m.inc.into_iter().map(|(k, n)| (k, Value::Number(n))).collect();
                    out.insert("$inc".into(), Value::Object(fields));
                }
                if !m.push.is_empty() {
                    out.insert("$push".into(), Value::Object(m.push.into_iter().collect()));
                }
                Value::Object(out)
            }
        }
    }
}

/// # Errors
/// Returns an error if the JSON string cannot be parsed into a query.
pub fn parse_query_json(json: &str) -> Result<Query, DbError> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(Query::all());
    }
    let v: Value = serde_json::from_str(trimmed).map_err(|e| DbError::InvalidQuery(e.to_string()))?;
    Query::try_from(v)
}

/// # Errors
/// Returns an error if the JSON string cannot be parsed into a patch.
pub fn parse_patch_json(json: &str) -> Result<Patch, DbError> {
    let v: Value = serde_json::from_str(json).map_err(|e| DbError::InvalidPatch(e.to_string()))?;
    Patch::try_from(v)
}

/// Build the document an upsert inserts: the query's equality fields overlaid by the patch.
pub(crate) fn upsert_seed(query: &Query) -> Document {
    let mut doc = Document::new();
    for (path, value) in &query.clauses {
        super::update::set_path(&mut doc, path, value.clone());
    }
    doc
}
