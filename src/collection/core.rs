use crate::document::{ensure_id, id_of};
use crate::errors::DbError;
use crate::fsutil;
use crate::logger::log_audit;
use crate::query::{Patch, Query, RemoveOptions, UpdateOptions, apply_patch, upsert_seed};
use crate::types::Document;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use super::datafile::{Datafile, LoadStats, Record};
use super::docset::DocSet;

/// Per-collection storage knobs.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    /// Sync the datafile after every append.
    pub fsync: bool,
    /// Compact once this many records were appended since the last rewrite. 0 disables.
    pub autocompact_after: usize,
    /// Maximum tolerated fraction of damaged lines when loading.
    pub corrupt_threshold: f64,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self { fsync: false, autocompact_after: 1000, corrupt_threshold: 0.10 }
    }
}

struct Inner {
    docs: DocSet,
    file: Datafile,
}

/// One named document collection backed by its own datafile.
///
/// All writes persist first and apply in memory second, both under the
/// collection's write lock, so readers never observe a half-applied write.
pub struct Collection {
    name: String,
    options: CollectionOptions,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("len", &self.len())
            .finish()
    }
}

impl Collection {
    /// Open (or create) `<dir>/<name>.db` and load its documents.
    ///
    /// # Errors
    /// `StorageFault` if the file cannot be read or written, or if more than
    /// `corrupt_threshold` of its lines are damaged.
    pub fn open(name: &str, dir: &Path, options: CollectionOptions) -> Result<Self, DbError> {
        let path = Self::datafile_path(dir, name);
        let (mut file, docs, stats) = Datafile::open(&path, options.fsync)?;
        if stats.corrupt > 0 {
            let ratio = stats.corrupt_ratio();
            if ratio > options.corrupt_threshold {
                return Err(DbError::StorageFault(format!(
                    "{}: {} of {} lines damaged ({:.0}%), above threshold {:.0}%",
                    path.display(),
                    stats.corrupt,
                    stats.records + stats.corrupt,
                    ratio * 100.0,
                    options.corrupt_threshold * 100.0
                )));
            }
            log::warn!("collection {name}: skipped {} damaged line(s)", stats.corrupt);
            fsutil::backup_corrupt(&path);
        }
        // Compact on load so superseded, damaged and torn records do not accumulate.
        if Self::needs_compaction(&stats, docs.len()) {
            file.rewrite(docs.iter())?;
        }
        log::info!("opened collection {name} ({} documents)", docs.len());
        Ok(Self { name: name.to_string(), options, inner: RwLock::new(Inner { docs, file }) })
    }

    #[must_use]
    pub fn datafile_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.db"))
    }

    fn needs_compaction(stats: &LoadStats, live: usize) -> bool {
        stats.torn_tail || stats.corrupt > 0 || stats.records > live
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.inner.read().file.path().to_path_buf()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn find(&self, query: &Query) -> Vec<Document> {
        let inner = self.inner.read();
        inner.docs.iter().filter(|d| query.matches(d)).cloned().collect()
    }

    #[must_use]
    pub fn find_one(&self, query: &Query) -> Option<Document> {
        let inner = self.inner.read();
        inner.docs.iter().find(|d| query.matches(d)).cloned()
    }

    #[must_use]
    pub fn count(&self, query: &Query) -> usize {
        let inner = self.inner.read();
        inner.docs.iter().filter(|d| query.matches(d)).count()
    }

    /// Insert a document, assigning `_id` if absent. Returns the stored document.
    ///
    /// # Errors
    /// `DuplicateId` if `_id` is taken, `InvalidDocument` for an unusable `_id`,
    /// `StorageFault` if the datafile cannot be written.
    pub fn insert(&self, mut doc: Document) -> Result<Document, DbError> {
        let mut inner = self.inner.write();
        if inner.docs.id_taken(&doc) {
            return Err(DbError::DuplicateId(id_of(&doc).unwrap_or_default()));
        }
        let id = ensure_id(&mut doc)?;
        inner.file.append(&Record::Insert { doc: doc.clone() })?;
        inner.docs.upsert(doc.clone());
        log_audit("insert", &self.name, &id);
        self.maybe_compact(&mut inner);
        Ok(doc)
    }

    /// Apply `patch` to the first match, or every match with `multi`.
    /// Returns how many documents the patch was applied to.
    ///
    /// # Errors
    /// `InvalidPatch` if the patch cannot apply to a matched document (nothing is
    /// written in that case), `StorageFault` on write failure.
    pub fn update(&self, query: &Query, patch: &Patch, opts: UpdateOptions) -> Result<usize, DbError> {
        let mut inner = self.inner.write();
        let mut matched = 0usize;
        let mut changed: Vec<Document> = Vec::new();
        for doc in inner.docs.iter().filter(|d| query.matches(d)) {
            matched += 1;
            let mut next = doc.clone();
            if apply_patch(&mut next, patch)? {
                changed.push(next);
            }
            if !opts.multi {
                break;
            }
        }
        if matched == 0 {
            if !opts.upsert {
                return Ok(0);
            }
            let mut doc = upsert_seed(query);
            match patch {
                Patch::Replace(fields) => doc.extend(fields.clone()),
                Patch::Modify(_) => {
                    apply_patch(&mut doc, patch)?;
                }
            }
            if inner.docs.id_taken(&doc) {
                return Err(DbError::DuplicateId(id_of(&doc).unwrap_or_default()));
            }
            let id = ensure_id(&mut doc)?;
            inner.file.append(&Record::Insert { doc: doc.clone() })?;
            inner.docs.upsert(doc);
            log_audit("upsert", &self.name, &id);
            self.maybe_compact(&mut inner);
            return Ok(1);
        }
        let records: Vec<Record> = changed.iter().map(|d| Record::Update { doc: d.clone() }).collect();
        inner.file.append_all(&records)?;
        for doc in changed {
            inner.docs.upsert(doc);
        }
        log_audit("update", &self.name, &format!("matched={matched}"));
        self.maybe_compact(&mut inner);
        Ok(matched)
    }

    /// Remove the first match, or every match with `multi`. Returns the number removed.
    ///
    /// # Errors
    /// `StorageFault` on write failure; nothing is removed in that case.
    pub fn remove(&self, query: &Query, opts: RemoveOptions) -> Result<usize, DbError> {
        let mut inner = self.inner.write();
        let matching = inner.docs.iter().filter(|d| query.matches(d)).filter_map(id_of);
        let ids: Vec<String> = if opts.multi { matching.collect() } else { matching.take(1).collect() };
        if ids.is_empty() {
            return Ok(0);
        }
        let records: Vec<Record> = ids.iter().map(|id| Record::Remove { id: id.clone() }).collect();
        inner.file.append_all(&records)?;
        for id in &ids {
            inner.docs.remove(id);
        }
        log_audit("remove", &self.name, &format!("removed={}", ids.len()));
        self.maybe_compact(&mut inner);
        Ok(ids.len())
    }

    /// Overwrite the collection with the empty set. Returns how many documents were dropped.
    ///
    /// # Errors
    /// `StorageFault` if the datafile cannot be rewritten.
    pub fn clear(&self) -> Result<usize, DbError> {
        let mut inner = self.inner.write();
        inner.file.rewrite(std::iter::empty())?;
        let n = inner.docs.clear();
        log_audit("clear", &self.name, &format!("removed={n}"));
        Ok(n)
    }

    /// Rewrite the datafile down to one record per live document.
    ///
    /// # Errors
    /// `StorageFault` if the rewrite fails; the previous file stays in place.
    pub fn compact(&self) -> Result<(), DbError> {
        let mut inner = self.inner.write();
        let Inner { docs, file } = &mut *inner;
        file.rewrite(docs.iter())
    }

    fn maybe_compact(&self, inner: &mut Inner) {
        let limit = self.options.autocompact_after;
        if limit == 0 || inner.file.appended() < limit {
            return;
        }
        let Inner { docs, file } = inner;
        // The triggering write is already durable; a failed compaction only costs space.
        if let Err(e) = file.rewrite(docs.iter()) {
            log::warn!("autocompaction of {} failed: {e}", self.name);
        }
    }
}
