use crate::document::{ensure_id, id_of};
use crate::types::{Document, DocumentId, ID_FIELD};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// In-memory documents of one collection, keyed by `_id`, iterated in insertion order.
#[derive(Debug, Default, Clone)]
pub(crate) struct DocSet {
    by_seq: BTreeMap<u64, Document>,
    seq_of: HashMap<DocumentId, u64>,
    next_seq: u64,
}

impl DocSet {
    pub fn len(&self) -> usize {
        self.by_seq.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seq_of.contains_key(id)
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.seq_of.get(id).and_then(|s| self.by_seq.get(s))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.by_seq.values()
    }

    /// Insert, or replace in place (keeping its position) when the id already exists.
    pub fn upsert(&mut self, mut doc: Document) {
        let id = match id_of(&doc) {
            Some(id) => id,
            None => {
                // Replayed legacy rows may lack an id; give them one.
                doc.remove(ID_FIELD);
                match ensure_id(&mut doc) {
                    Ok(id) => id,
                    Err(_) => return,
                }
            }
        };
        if let Some(seq) = self.seq_of.get(&id) {
            self.by_seq.insert(*seq, doc);
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_of.insert(id, seq);
        self.by_seq.insert(seq, doc);
    }

    pub fn remove(&mut self, id: &str) -> Option<Document> {
        let seq = self.seq_of.remove(id)?;
        self.by_seq.remove(&seq)
    }

    pub fn clear(&mut self) -> usize {
        let n = self.by_seq.len();
        self.by_seq.clear();
        self.seq_of.clear();
        n
    }

    /// True when `doc`'s `_id` value is already taken.
    pub fn id_taken(&self, doc: &Document) -> bool {
        match doc.get(ID_FIELD) {
            Some(Value::Null) | None => false,
            Some(_) => id_of(doc).is_some_and(|id| self.contains(&id)),
        }
    }
}
