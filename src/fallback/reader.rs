use crate::errors::DbError;
use crate::kv::KvStore;
use crate::query::Query;
use crate::registry::Registry;
use crate::types::Document;
use serde_json::Value;
use std::sync::Arc;

use super::aliases::{self, Dataset};

/// Where a recovered result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Primary,
    Cache { key: &'static str },
    AlternateCollection { name: &'static str },
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Primary => f.write_str("primary"),
            Source::Cache { key } => write!(f, "cache:{key}"),
            Source::AlternateCollection { name } => write!(f, "collection:{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    /// `None` when every source was empty.
    pub source: Option<Source>,
    pub documents: Vec<Document>,
}

impl Recovered {
    #[must_use]
    pub fn empty() -> Self {
        Self { source: None, documents: Vec::new() }
    }
}

/// One source of a dataset's documents. `Ok(None)` means "nothing here".
pub trait DatasetReader: Send + Sync {
    fn label(&self) -> &'static str;
    fn read(&self, dataset: &Dataset) -> Result<Option<(Source, Vec<Document>)>, DbError>;
}

/// Reads the canonical collection through the registry.
pub struct PrimaryReader {
    registry: Arc<Registry>,
}

impl PrimaryReader {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl DatasetReader for PrimaryReader {
    fn label(&self) -> &'static str {
        "primary"
    }

    fn read(&self, dataset: &Dataset) -> Result<Option<(Source, Vec<Document>)>, DbError> {
        let docs = self.registry.find(dataset.canonical, &Query::all())?;
        Ok((!docs.is_empty()).then_some((Source::Primary, docs)))
    }
}

/// Reads denormalized copies under each of the dataset's cache keys.
pub struct CacheReader {
    kv: Arc<KvStore>,
}

impl CacheReader {
    #[must_use]
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }
}

/// Parse a cache entry: an array of objects, or an object wrapping one under `data`/`items`.
///
/// # Errors
/// `MalformedCacheEntry` for anything else.
pub fn parse_cache_entry(key: &str, text: &str) -> Result<Vec<Document>, DbError> {
    let malformed = |reason: String| DbError::MalformedCacheEntry { key: key.to_string(), reason };
    let value: Value = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data").or_else(|| obj.remove("items")) {
            Some(Value::Array(items)) => items,
            _ => return Err(malformed("object without a data/items array".into())),
        },
        Value::Null => return Ok(Vec::new()),
        _ => return Err(malformed("expected an array of records".into())),
    };
    let total = items.len();
    let docs: Vec<Document> = items
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(m) => Some(m),
            _ => None,
        })
        .collect();
    if docs.len() != total {
        log::warn!("cache entry {key}: dropped {} non-object record(s)", total - docs.len());
    }
    Ok(docs)
}

impl DatasetReader for CacheReader {
    fn label(&self) -> &'static str {
        "cache"
    }

    fn read(&self, dataset: &Dataset) -> Result<Option<(Source, Vec<Document>)>, DbError> {
        for &key in dataset.cache_keys {
            let Some(text) = self.kv.get(key) else { continue };
            match parse_cache_entry(key, &text) {
                Ok(docs) if !docs.is_empty() => return Ok(Some((Source::Cache { key }, docs))),
                Ok(_) => {}
                Err(e) => log::warn!("fallback {}: ignoring cache entry: {e}", dataset.name),
            }
        }
        Ok(None)
    }
}

/// Reads legacy collections directly, bypassing the canonical name.
pub struct AlternateCollectionReader {
    registry: Arc<Registry>,
}

impl AlternateCollectionReader {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl DatasetReader for AlternateCollectionReader {
    fn label(&self) -> &'static str {
        "alternate"
    }

    fn read(&self, dataset: &Dataset) -> Result<Option<(Source, Vec<Document>)>, DbError> {
        for &name in dataset.alternate_collections {
            match self.registry.find(name, &Query::all()) {
                Ok(docs) if !docs.is_empty() => {
                    return Ok(Some((Source::AlternateCollection { name }, docs)));
                }
                Ok(_) => {}
                Err(DbError::UnknownCollection(_)) => {
                    log::debug!("fallback {}: legacy collection {name} not registered", dataset.name);
                }
                Err(e) => log::warn!("fallback {}: {name} unreadable: {e}", dataset.name),
            }
        }
        Ok(None)
    }
}

/// Tries each reader in priority order; the first non-empty result wins.
///
/// Faults in any reader are logged and the next reader is tried. Every source
/// empty is a valid outcome, not an error.
pub struct RecoveringReader {
    readers: Vec<Box<dyn DatasetReader>>,
}

impl RecoveringReader {
    #[must_use]
    pub fn new(readers: Vec<Box<dyn DatasetReader>>) -> Self {
        Self { readers }
    }

    /// Primary collection, then secondary cache, then legacy collections.
    #[must_use]
    pub fn standard(registry: Arc<Registry>, kv: Arc<KvStore>) -> Self {
        Self::new(vec![
            Box::new(PrimaryReader::new(Arc::clone(&registry))),
            Box::new(CacheReader::new(kv)),
            Box::new(AlternateCollectionReader::new(registry)),
        ])
    }

    #[must_use]
    pub fn read(&self, dataset: &Dataset) -> Recovered {
        for reader in &self.readers {
            match reader.read(dataset) {
                Ok(Some((source, documents))) => {
                    if source != Source::Primary {
                        log::info!(
                            "fallback {}: recovered {} record(s) via {}",
                            dataset.name,
                            documents.len(),
                            reader.label()
                        );
                    }
                    return Recovered { source: Some(source), documents };
                }
                Ok(None) => {}
                Err(e) => log::warn!("fallback {}: {} read failed: {e}", dataset.name, reader.label()),
            }
        }
        Recovered::empty()
    }

    /// Read a dataset by name or alias.
    ///
    /// # Errors
    /// `UnknownCollection` if the name matches no dataset.
    pub fn read_named(&self, name: &str) -> Result<Recovered, DbError> {
        let ds = aliases::dataset(name).ok_or_else(|| DbError::UnknownCollection(name.to_string()))?;
        Ok(self.read(ds))
    }
}
