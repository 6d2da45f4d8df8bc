//! Append-only collection datafile.
//!
//! One record per line: `<crc32 as 8 hex digits> <json>`. The JSON is a tagged
//! [`Record`]. Loading replays every line in order; lines that fail the checksum,
//! are not UTF-8, or do not parse are skipped and counted so the caller can
//! decide whether the file is too damaged to trust. An undecodable final line
//! with no newline is a torn append and ends the log without counting as damage.

use crate::errors::DbError;
use crate::fsutil;
use crate::types::{Document, DocumentId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::docset::DocSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub(crate) enum Record {
    Insert { doc: Document },
    Update { doc: Document },
    Remove { id: DocumentId },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub records: usize,
    pub corrupt: usize,
    /// The file did not end on a record boundary and must be rewritten before appending.
    pub torn_tail: bool,
}

impl LoadStats {
    #[must_use]
    pub fn corrupt_ratio(&self) -> f64 {
        let total = self.records + self.corrupt;
        if total == 0 { 0.0 } else { self.corrupt as f64 / total as f64 }
    }
}

pub(crate) struct Datafile {
    path: PathBuf,
    writer: BufWriter<File>,
    fsync: bool,
    appended: usize,
}

impl std::fmt::Debug for Datafile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datafile")
            .field("path", &self.path)
            .field("fsync", &self.fsync)
            .field("appended", &self.appended)
            .finish()
    }
}

pub(crate) fn encode_line(rec: &Record) -> Result<String, DbError> {
    let json = serde_json::to_string(rec)?;
    Ok(format!("{:08x} {json}\n", crc32fast::hash(json.as_bytes())))
}

pub(crate) fn decode_line(line: &str) -> Option<Record> {
    let (crc_hex, json) = line.split_once(' ')?;
    let stored = u32::from_str_radix(crc_hex, 16).ok()?;
    if crc_hex.len() != 8 || crc32fast::hash(json.as_bytes()) != stored {
        return None;
    }
    serde_json::from_str(json).ok()
}

fn replay_into(docs: &mut DocSet, rec: Record) {
    match rec {
        Record::Insert { doc } | Record::Update { doc } => docs.upsert(doc),
        Record::Remove { id } => {
            docs.remove(&id);
        }
    }
}

impl Datafile {
    /// Open (creating if missing) and replay the datafile.
    pub fn open(path: &Path, fsync: bool) -> Result<(Self, DocSet, LoadStats), DbError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = fsutil::open_append(path)?;
        let bytes = fs::read(path)?;
        let mut docs = DocSet::default();
        let mut stats = LoadStats::default();
        let mut lines = bytes.split(|b| *b == b'\n').peekable();
        while let Some(raw) = lines.next() {
            let last = lines.peek().is_none();
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let rec = std::str::from_utf8(raw).ok().and_then(|l| decode_line(l.trim_end_matches('\r')));
            if last {
                // Bytes after the final newline: a record the writer never finished.
                stats.torn_tail = true;
            }
            match rec {
                Some(rec) => {
                    stats.records += 1;
                    replay_into(&mut docs, rec);
                }
                None if last => {
                    log::warn!("{}: dropping torn record at end of file", path.display());
                }
                None => stats.corrupt += 1,
            }
        }
        let df = Datafile { path: path.to_path_buf(), writer: BufWriter::new(file), fsync, appended: 0 };
        Ok((df, docs, stats))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended since the last rewrite.
    pub fn appended(&self) -> usize {
        self.appended
    }

    /// Append records as one write. Nothing is applied in memory by this call.
    pub fn append_all(&mut self, recs: &[Record]) -> Result<(), DbError> {
        if recs.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for r in recs {
            buf.push_str(&encode_line(r)?);
        }
        self.writer.write_all(buf.as_bytes())?;
        self.writer.flush()?;
        if self.fsync {
            self.writer.get_ref().sync_data()?;
        }
        self.appended += recs.len();
        Ok(())
    }

    pub fn append(&mut self, rec: &Record) -> Result<(), DbError> {
        self.append_all(std::slice::from_ref(rec))
    }

    /// Rewrite the file to exactly `docs`, atomically, then reopen for appends.
    pub fn rewrite<'a>(&mut self, docs: impl Iterator<Item = &'a Document>) -> Result<(), DbError> {
        let mut buf = String::new();
        for d in docs {
            buf.push_str(&encode_line(&Record::Insert { doc: d.clone() })?);
        }
        self.writer.flush()?;
        fsutil::write_atomic(&self.path, buf.as_bytes())?;
        self.writer = BufWriter::new(fsutil::open_append(&self.path)?);
        self.appended = 0;
        Ok(())
    }
}
