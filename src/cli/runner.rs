use crate::Store;
use crate::bridge::dispatch_json;
use crate::document::parse_document_json;
use crate::fallback::ResetReport;
use crate::query::{RemoveOptions, UpdateOptions, parse_patch_json, parse_query_json};
use crate::types::Document;
use serde_json::json;
use std::io::{BufRead, Write};

use super::command::Command;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    /// NDJSON for documents, `key=value` lines for everything else.
    Human,
    /// One JSON value per command.
    Json,
}

fn write_docs(out: &mut dyn Write, docs: &[Document], mode: OutputMode) -> Result<(), Box<dyn std::error::Error>> {
    match mode {
        OutputMode::Json => writeln!(out, "{}", serde_json::to_string(docs)?)?,
        OutputMode::Human => {
            for doc in docs {
                writeln!(out, "{}", serde_json::to_string(doc)?)?;
            }
        }
    }
    Ok(())
}

fn reset_json(report: &ResetReport) -> serde_json::Value {
    let failures: Vec<_> = report
        .failures
        .iter()
        .map(|f| json!({"target": f.target, "step": format!("{:?}", f.step), "error": f.error}))
        .collect();
    json!({
        "success": report.success,
        "cleared": report.cleared,
        "removedKeys": report.removed_keys,
        "poisoned": report.poisoned,
        "failures": failures,
        "skipSeedUntil": report.skip_seed_until.map(|t| t.to_rfc3339()),
        "reloadAfterMs": u64::try_from(report.reload_after.as_millis()).unwrap_or(u64::MAX),
    })
}

/// Execute `cmd` against `store`, writing results to `out`.
///
/// # Errors
/// Any store error, an I/O error on `out`, or an incomplete reset/compaction.
pub fn run(
    store: &Store,
    cmd: Command,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = store.registry();
    match cmd {
        Command::Init => {
            let seed = registry.seed_report();
            let faults = registry.faults();
            match mode {
                OutputMode::Json => {
                    let faults: Vec<_> =
                        faults.iter().map(|(n, r)| json!({"collection": n, "reason": r})).collect();
                    let j = json!({
                        "dataDir": registry.data_dir().display().to_string(),
                        "collections": registry.names(),
                        "seeded": seed.seeded,
                        "seedSkipped": seed.skipped,
                        "faults": faults,
                    });
                    writeln!(out, "{j}")?;
                }
                OutputMode::Human => {
                    writeln!(out, "data_dir={}", registry.data_dir().display())?;
                    writeln!(out, "collections={}", registry.names().len())?;
                    writeln!(out, "seeded={} seed_skipped={}", seed.seeded.join(","), seed.skipped)?;
                    for (name, reason) in faults {
                        writeln!(out, "fault {name}: {reason}")?;
                    }
                }
            }
            Ok(())
        }
        Command::Get { collection, query_json } => {
            let query = parse_query_json(&query_json)?;
            let docs = registry.find(&collection, &query)?;
            write_docs(out, &docs, mode)
        }
        Command::GetOne { collection, query_json } => {
            let query = parse_query_json(&query_json)?;
            let doc = registry.find_one(&collection, &query)?;
            match (mode, doc) {
                (OutputMode::Json, doc) => writeln!(out, "{}", serde_json::to_string(&doc)?)?,
                (OutputMode::Human, Some(doc)) => writeln!(out, "{}", serde_json::to_string(&doc)?)?,
                (OutputMode::Human, None) => writeln!(out, "not_found")?,
            }
            Ok(())
        }
        Command::Insert { collection, json } => {
            let doc = registry.insert(&collection, parse_document_json(&json)?)?;
            writeln!(out, "{}", serde_json::to_string(&doc)?)?;
            Ok(())
        }
        Command::Update { collection, query_json, patch_json, multi, upsert } => {
            let query = parse_query_json(&query_json)?;
            let patch = parse_patch_json(&patch_json)?;
            let n = registry.update(&collection, &query, &patch, UpdateOptions { multi, upsert })?;
            match mode {
                OutputMode::Json => writeln!(out, "{}", json!({"matched": n}))?,
                OutputMode::Human => writeln!(out, "matched={n}")?,
            }
            Ok(())
        }
        Command::Remove { collection, query_json, multi } => {
            let query = parse_query_json(&query_json)?;
            let n = registry.remove(&collection, &query, RemoveOptions { multi })?;
            match mode {
                OutputMode::Json => writeln!(out, "{}", json!({"removed": n}))?,
                OutputMode::Human => writeln!(out, "removed={n}")?,
            }
            Ok(())
        }
        Command::Count { collection, query_json } => {
            let query = parse_query_json(&query_json)?;
            let n = registry.count(&collection, &query)?;
            match mode {
                OutputMode::Json => writeln!(out, "{}", json!({"count": n}))?,
                OutputMode::Human => writeln!(out, "{n}")?,
            }
            Ok(())
        }
        Command::Recover { dataset } => {
            let recovered = store.recover(&dataset)?;
            let source = recovered.source.map(|s| s.to_string());
            match mode {
                OutputMode::Json => {
                    let j = json!({"source": source, "documents": recovered.documents});
                    writeln!(out, "{j}")?;
                }
                OutputMode::Human => {
                    writeln!(
                        out,
                        "source={} records={}",
                        source.as_deref().unwrap_or("none"),
                        recovered.documents.len()
                    )?;
                    write_docs(out, &recovered.documents, mode)?;
                }
            }
            Ok(())
        }
        Command::Clean => {
            let report = store.clean_database();
            match mode {
                OutputMode::Json => writeln!(out, "{}", reset_json(&report))?,
                OutputMode::Human => {
                    writeln!(
                        out,
                        "success={} cleared={} removed_keys={} poisoned={}",
                        report.success,
                        report.cleared.len(),
                        report.removed_keys.len(),
                        report.poisoned.len()
                    )?;
                    for f in &report.failures {
                        writeln!(out, "failed {:?} {}: {}", f.step, f.target, f.error)?;
                    }
                }
            }
            if report.success {
                Ok(())
            } else {
                Err("reset incomplete: some collections were not cleared".into())
            }
        }
        Command::Compact => {
            let failed = registry.compact_all();
            for (name, e) in &failed {
                writeln!(out, "compact {name} failed: {e}")?;
            }
            if failed.is_empty() {
                if mode == OutputMode::Json {
                    writeln!(out, "{}", json!({"compacted": registry.names().len()}))?;
                } else {
                    writeln!(out, "compacted={}", registry.names().len())?;
                }
                Ok(())
            } else {
                Err(format!("{} collection(s) failed to compact", failed.len()).into())
            }
        }
        Command::CacheGet { key } => {
            match (store.kv().get(&key), mode) {
                (Some(v), _) => writeln!(out, "{v}")?,
                (None, OutputMode::Json) => writeln!(out, "null")?,
                (None, OutputMode::Human) => writeln!(out, "not_found")?,
            }
            Ok(())
        }
        Command::CacheSet { key, value } => {
            store.kv().set(&key, value)?;
            Ok(())
        }
        Command::CacheRemove { key } => {
            let removed = store.kv().remove(&key)?;
            match mode {
                OutputMode::Json => writeln!(out, "{}", json!({"removed": removed}))?,
                OutputMode::Human => writeln!(out, "removed={removed}")?,
            }
            Ok(())
        }
        Command::CacheList => {
            let keys = store.kv().keys();
            match mode {
                OutputMode::Json => writeln!(out, "{}", serde_json::to_string(&keys)?)?,
                OutputMode::Human => {
                    for k in keys {
                        writeln!(out, "{k}")?;
                    }
                }
            }
            Ok(())
        }
    }
}

/// Answer one JSON bridge request per input line until EOF. Returns the number of requests served.
///
/// # Errors
/// Only I/O errors on `input` or `out`; request failures are written as error envelopes.
pub fn serve_lines(
    store: &Store,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut served = 0usize;
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let req = line.trim();
        if req.is_empty() {
            continue;
        }
        writeln!(out, "{}", dispatch_json(store.registry(), req))?;
        out.flush()?;
        served += 1;
    }
    Ok(served)
}
