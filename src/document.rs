//! Document helpers: identifier assignment and conversion from raw JSON.

use crate::errors::DbError;
use crate::types::{Document, DocumentId, ID_FIELD};
use serde_json::Value;
use uuid::Uuid;

/// Returns the document's identifier in string form, if it has a usable one.
#[must_use]
pub fn id_of(doc: &Document) -> Option<DocumentId> {
    match doc.get(ID_FIELD)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Ensure the document carries an identifier, generating a UUID v4 when absent.
///
/// # Errors
/// Returns `InvalidDocument` if `_id` is present but not a non-empty string or a number.
pub fn ensure_id(doc: &mut Document) -> Result<DocumentId, DbError> {
    match doc.get(ID_FIELD) {
        None | Some(Value::Null) => {
            let id = Uuid::new_v4().to_string();
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            Ok(id)
        }
        Some(_) => id_of(doc).ok_or_else(|| {
            DbError::InvalidDocument(format!("{ID_FIELD} must be a non-empty string or a number"))
        }),
    }
}

/// Convert a JSON value into a document. Only objects are accepted.
///
/// # Errors
/// Returns `InvalidDocument` for any non-object value.
pub fn from_value(value: Value) -> Result<Document, DbError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DbError::InvalidDocument(format!("expected JSON object, got {}", kind_name(&other)))),
    }
}

/// Parse a JSON string into a document.
///
/// # Errors
/// Returns `Json` on parse failure or `InvalidDocument` for non-objects.
pub fn parse_document_json(json: &str) -> Result<Document, DbError> {
    from_value(serde_json::from_str(json)?)
}

pub(crate) fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
