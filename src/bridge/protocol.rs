use crate::errors::DbError;
use crate::query::{Patch, Query, RemoveOptions, UpdateOptions};
use crate::registry::Registry;
use crate::types::{CollectionName, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One bridge call. Every variant names its collection; no state carries between calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Request {
    Get {
        collection: CollectionName,
        #[serde(default)]
        query: Query,
    },
    GetOne {
        collection: CollectionName,
        #[serde(default)]
        query: Query,
    },
    Insert {
        collection: CollectionName,
        document: Document,
    },
    Update {
        collection: CollectionName,
        #[serde(default)]
        query: Query,
        patch: Patch,
        #[serde(default)]
        options: UpdateOptions,
    },
    Remove {
        collection: CollectionName,
        #[serde(default)]
        query: Query,
        #[serde(default)]
        options: RemoveOptions,
    },
    Count {
        collection: CollectionName,
        #[serde(default)]
        query: Query,
    },
}

impl Request {
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Request::Get { collection, .. }
            | Request::GetOne { collection, .. }
            | Request::Insert { collection, .. }
            | Request::Update { collection, .. }
            | Request::Remove { collection, .. }
            | Request::Count { collection, .. } => collection,
        }
    }

    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Request::Get { .. } => "get",
            Request::GetOne { .. } => "getOne",
            Request::Insert { .. } => "insert",
            Request::Update { .. } => "update",
            Request::Remove { .. } => "remove",
            Request::Count { .. } => "count",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Documents(Vec<Document>),
    Document(Option<Document>),
    Count(usize),
}

/// Execute one request against the registry.
///
/// # Errors
/// Whatever the underlying registry operation reports.
pub fn dispatch(registry: &Registry, request: Request) -> Result<Response, DbError> {
    log::debug!("bridge {} {}", request.op(), request.collection());
    Ok(match request {
        Request::Get { collection, query } => Response::Documents(registry.find(&collection, &query)?),
        Request::GetOne { collection, query } => {
            Response::Document(registry.find_one(&collection, &query)?)
        }
        Request::Insert { collection, document } => {
            Response::Document(Some(registry.insert(&collection, document)?))
        }
        Request::Update { collection, query, patch, options } => {
            Response::Count(registry.update(&collection, &query, &patch, options)?)
        }
        Request::Remove { collection, query, options } => {
            Response::Count(registry.remove(&collection, &query, options)?)
        }
        Request::Count { collection, query } => Response::Count(registry.count(&collection, &query)?),
    })
}

fn error_envelope(e: &DbError) -> Value {
    json!({"error": {"kind": e.kind(), "message": e.to_string()}})
}

/// JSON-in, JSON-out form of [`dispatch`]: `{"ok": <result>}` or `{"error": {"kind", "message"}}`.
#[must_use]
pub fn dispatch_json(registry: &Registry, request_json: &str) -> String {
    let out = match serde_json::from_str::<Request>(request_json) {
        Ok(req) => match dispatch(registry, req) {
            Ok(resp) => json!({"ok": resp}),
            Err(e) => error_envelope(&e),
        },
        Err(e) => error_envelope(&DbError::Json(e)),
    };
    out.to_string()
}
