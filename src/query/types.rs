use crate::types::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_PATH_LEN: usize = 1024;
pub(crate) const MAX_CLAUSES: usize = 128;

/// Query-by-example filter: every clause must equal the document's value at `path`.
///
/// The empty query matches every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Query {
    pub(crate) clauses: Vec<(String, Value)>,
}

impl Query {
    /// The match-everything query (`{}`).
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality clause. Dotted paths address nested objects.
    #[must_use]
    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        let path = path.into();
        let value = value.into();
        match self.clauses.iter_mut().find(|(p, _)| *p == path) {
            Some(slot) => slot.1 = value,
            None => self.clauses.push((path, value)),
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.clauses.iter().map(|(p, v)| (p.as_str(), v))
    }

    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        super::eval::matches(doc, self)
    }
}

/// Field modifiers applied in place by an update.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Modifiers {
    pub set: Vec<(String, Value)>,
    pub unset: Vec<String>,
    pub inc: Vec<(String, Number)>,
    pub push: Vec<(String, Value)>,
}

/// What an update does to each matched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Patch {
    /// Replace every field except `_id`.
    Replace(Document),
    /// Apply `$set`/`$unset`/`$inc`/`$push`.
    Modify(Modifiers),
}

impl Patch {
    /// Shorthand for a `$set` of the given fields; the common partial update.
    #[must_use]
    pub fn set(fields: Document) -> Self {
        Patch::Modify(Modifiers { set: fields.into_iter().collect(), ..Modifiers::default() })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOptions {
    pub multi: bool,
    pub upsert: bool,
}

impl UpdateOptions {
    #[must_use]
    pub fn multi() -> Self {
        Self { multi: true, upsert: false }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveOptions {
    pub multi: bool,
}

impl RemoveOptions {
    #[must_use]
    pub fn multi() -> Self {
        Self { multi: true }
    }
}
