//! The fixed set of named collections, opened once at process start.

mod seed;

pub use seed::{EXPENSE_CATEGORIES, SeedReport, SkipSeed};

use crate::collection::{Collection, CollectionOptions};
use crate::config::StoreConfig;
use crate::errors::DbError;
use crate::query::{Patch, Query, RemoveOptions, UpdateOptions};
use crate::types::{CollectionName, Document};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Every collection the application uses. Extend only through [`RegistryBuilder`].
pub const COLLECTIONS: &[&str] = &[
    "customers",
    "stock",
    "bills",
    "payments",
    "cashLedger",
    "bankLedger",
    "tradeReceivable",
    "tradePayable",
    "purchases",
    "receipts",
    "expenses",
    "expenseCategories",
];

#[derive(Debug)]
enum Slot {
    Ready(Arc<Collection>),
    /// The datafile could not be loaded; every operation reports this fault.
    Faulted(String),
}

#[derive(Debug)]
pub struct Registry {
    data_dir: PathBuf,
    names: Vec<CollectionName>,
    slots: HashMap<CollectionName, Slot>,
    seed_report: SeedReport,
}

pub struct RegistryBuilder {
    data_dir: PathBuf,
    options: CollectionOptions,
    names: Vec<CollectionName>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            options: config.collection_options(),
            names: COLLECTIONS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Register an extra collection name. Duplicates are ignored.
    #[must_use]
    pub fn with_collection(mut self, name: &str) -> Self {
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
        self
    }

    /// Open every collection, then seed empty ones unless `skip_seed` is active.
    ///
    /// A collection whose datafile cannot be loaded is registered as faulted
    /// instead of failing the whole open.
    ///
    /// # Errors
    /// `StorageFault` if the data directory cannot be created or seeding cannot write.
    pub fn open(self, skip_seed: SkipSeed) -> Result<Registry, DbError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            DbError::StorageFault(format!("cannot create {}: {e}", self.data_dir.display()))
        })?;
        let mut slots = HashMap::with_capacity(self.names.len());
        for name in &self.names {
            let slot = match Collection::open(name, &self.data_dir, self.options.clone()) {
                Ok(c) => Slot::Ready(Arc::new(c)),
                Err(e) => {
                    log::error!("collection {name} unavailable: {e}");
                    Slot::Faulted(e.to_string())
                }
            };
            slots.insert(name.clone(), slot);
        }
        let mut registry =
            Registry { data_dir: self.data_dir, names: self.names, slots, seed_report: SeedReport::default() };
        registry.seed_report = registry.seed(skip_seed)?;
        Ok(registry)
    }
}

impl Registry {
    /// Open the default collection set described by `config`.
    ///
    /// # Errors
    /// See [`RegistryBuilder::open`].
    pub fn open(config: &StoreConfig, skip_seed: SkipSeed) -> Result<Self, DbError> {
        RegistryBuilder::new(config).open(skip_seed)
    }

    fn seed(&self, skip_seed: SkipSeed) -> Result<SeedReport, DbError> {
        if skip_seed.is_active() {
            log::info!("seeding skipped: store was just cleaned");
            return Ok(SeedReport { seeded: Vec::new(), skipped: true });
        }
        let mut report = SeedReport::default();
        for name in &self.names {
            let rows = seed::seed_rows(name);
            if rows.is_empty() {
                continue;
            }
            match self.slots.get(name) {
                Some(Slot::Ready(col)) => {
                    if seed::seed_if_empty(col, rows)? {
                        report.seeded.push(name.clone());
                    }
                }
                _ => log::warn!("not seeding {name}: collection unavailable"),
            }
        }
        Ok(report)
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn names(&self) -> &[CollectionName] {
        &self.names
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    #[must_use]
    pub fn seed_report(&self) -> &SeedReport {
        &self.seed_report
    }

    /// Collections that failed to load, with the reason.
    #[must_use]
    pub fn faults(&self) -> Vec<(CollectionName, String)> {
        self.names
            .iter()
            .filter_map(|n| match self.slots.get(n) {
                Some(Slot::Faulted(reason)) => Some((n.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }

    /// # Errors
    /// `UnknownCollection` for unregistered names, `StorageFault` for faulted collections.
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        match self.slots.get(name) {
            Some(Slot::Ready(c)) => Ok(Arc::clone(c)),
            Some(Slot::Faulted(reason)) => {
                Err(DbError::StorageFault(format!("{name} unavailable: {reason}")))
            }
            None => Err(DbError::UnknownCollection(name.to_string())),
        }
    }

    pub fn find(&self, name: &str, query: &Query) -> Result<Vec<Document>, DbError> {
        Ok(self.collection(name)?.find(query))
    }

    pub fn find_one(&self, name: &str, query: &Query) -> Result<Option<Document>, DbError> {
        Ok(self.collection(name)?.find_one(query))
    }

    pub fn count(&self, name: &str, query: &Query) -> Result<usize, DbError> {
        Ok(self.collection(name)?.count(query))
    }

    pub fn insert(&self, name: &str, doc: Document) -> Result<Document, DbError> {
        self.collection(name)?.insert(doc)
    }

    pub fn update(
        &self,
        name: &str,
        query: &Query,
        patch: &Patch,
        opts: UpdateOptions,
    ) -> Result<usize, DbError> {
        self.collection(name)?.update(query, patch, opts)
    }

    pub fn remove(&self, name: &str, query: &Query, opts: RemoveOptions) -> Result<usize, DbError> {
        self.collection(name)?.remove(query, opts)
    }

    pub fn clear(&self, name: &str) -> Result<usize, DbError> {
        self.collection(name)?.clear()
    }

    /// Compact every loaded collection; returns the names that failed.
    pub fn compact_all(&self) -> Vec<(CollectionName, DbError)> {
        let mut failed = Vec::new();
        for name in &self.names {
            if let Some(Slot::Ready(c)) = self.slots.get(name)
                && let Err(e) = c.compact()
            {
                failed.push((name.clone(), e));
            }
        }
        failed
    }
}
