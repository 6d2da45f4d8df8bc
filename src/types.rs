use serde_json::{Map, Value};

pub type CollectionName = String;
pub type DocumentId = String;

/// A document is a JSON object. Values may nest arbitrarily.
pub type Document = Map<String, Value>;

/// Field holding a document's identifier.
pub const ID_FIELD: &str = "_id";
