use crate::errors::DbError;
use crate::kv::KvStore;
use crate::logger::log_audit;
use crate::query::{Query, RemoveOptions};
use crate::registry::Registry;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::aliases::{self, DATASETS, Dataset};
use super::marker::CleanMarker;

/// Value written over a critical cache key that survived deletion.
pub const EMPTY_ENTRY: &str = "[]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStep {
    Clear,
    RemoveAll,
    DeleteCacheKey,
    Poison,
    Marker,
    ForceReload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetFailure {
    pub target: String,
    pub step: ResetStep,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResetReport {
    /// Every dataset's canonical collection was cleared.
    pub success: bool,
    pub cleared: Vec<String>,
    pub removed_keys: Vec<String>,
    pub poisoned: Vec<String>,
    pub failures: Vec<ResetFailure>,
    /// Seeding is suppressed until this instant.
    pub skip_seed_until: Option<DateTime<Utc>>,
    /// Delay before the host should reload from a clean slate.
    pub reload_after: Duration,
}

/// Best-effort destructive wipe of every dataset, all aliases included.
pub struct Resetter {
    registry: Arc<Registry>,
    kv: Arc<KvStore>,
    marker: Arc<CleanMarker>,
    datasets: Vec<&'static Dataset>,
    reload_delay: Duration,
}

impl Resetter {
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        kv: Arc<KvStore>,
        marker: Arc<CleanMarker>,
        reload_delay: Duration,
    ) -> Self {
        Self { registry, kv, marker, datasets: DATASETS.iter().collect(), reload_delay }
    }

    /// Restrict the wipe to the named datasets (names or aliases). Unknown names are ignored.
    #[must_use]
    pub fn with_datasets(mut self, names: &[&str]) -> Self {
        let mut picked: Vec<&'static Dataset> = Vec::new();
        for name in names {
            match aliases::dataset(name) {
                Some(d) if !picked.contains(&d) => picked.push(d),
                Some(_) => {}
                None => log::warn!("reset: unknown dataset {name}"),
            }
        }
        self.datasets = picked;
        self
    }

    /// Wipe every target, tolerating each step's failure independently.
    ///
    /// Never fails as a whole; inspect [`ResetReport::success`] and
    /// [`ResetReport::failures`]. Running it twice leaves the same state.
    pub fn clean_database(&self) -> ResetReport {
        let mut report = ResetReport {
            success: true,
            cleared: Vec::new(),
            removed_keys: Vec::new(),
            poisoned: Vec::new(),
            failures: Vec::new(),
            skip_seed_until: None,
            reload_after: self.reload_delay,
        };

        let mut seen: Vec<&str> = Vec::new();
        for ds in &self.datasets {
            let primary_ok = self.wipe_collection(ds.canonical, false, &mut report);
            report.success &= primary_ok;
            seen.push(ds.canonical);
            for &alt in ds.alternate_collections {
                if !seen.contains(&alt) {
                    seen.push(alt);
                    self.wipe_collection(alt, true, &mut report);
                }
            }
            for &key in ds.cache_keys {
                match self.kv.remove(key) {
                    Ok(true) => report.removed_keys.push(key.to_string()),
                    Ok(false) => {}
                    Err(e) => fail(&mut report, key, ResetStep::DeleteCacheKey, &e),
                }
            }
        }

        self.poison_survivors(&mut report);

        match self.marker.mark() {
            Ok(until) => report.skip_seed_until = Some(until),
            Err(e) => fail(&mut report, "marker", ResetStep::Marker, &e),
        }
        if let Err(e) = self.marker.set_force_reload() {
            fail(&mut report, "marker", ResetStep::ForceReload, &e);
        }

        log_audit(
            "reset",
            "*",
            &format!(
                "success={} cleared={} keys={} failures={}",
                report.success,
                report.cleared.len(),
                report.removed_keys.len(),
                report.failures.len()
            ),
        );
        report
    }

    /// Overwrite, then delete-all as a second pass. Returns whether the overwrite succeeded.
    fn wipe_collection(&self, name: &str, legacy: bool, report: &mut ResetReport) -> bool {
        if legacy && !self.registry.is_registered(name) {
            log::debug!("reset: legacy collection {name} not registered");
            return true;
        }
        let cleared = match self.registry.clear(name) {
            Ok(n) => {
                log::info!("reset: cleared {name} ({n} document(s))");
                report.cleared.push(name.to_string());
                true
            }
            Err(e) => {
                fail(report, name, ResetStep::Clear, &e);
                false
            }
        };
        if let Err(e) = self.registry.remove(name, &Query::all(), RemoveOptions { multi: true }) {
            fail(report, name, ResetStep::RemoveAll, &e);
        }
        cleared
    }

    fn poison_survivors(&self, report: &mut ResetReport) {
        for key in aliases::critical_keys() {
            match self.kv.get(key) {
                Some(v) if v != EMPTY_ENTRY => match self.kv.set(key, EMPTY_ENTRY) {
                    Ok(()) => {
                        log::warn!("reset: {key} survived deletion; overwritten with empty list");
                        report.poisoned.push(key.to_string());
                    }
                    Err(e) => fail(report, key, ResetStep::Poison, &e),
                },
                _ => {}
            }
        }
    }

    /// Run `hook` once the report's reload delay has elapsed. Requires a tokio runtime.
    pub fn schedule_reload<F>(report: &ResetReport, hook: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = report.reload_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            hook();
        })
    }
}

fn fail(report: &mut ResetReport, target: &str, step: ResetStep, e: &DbError) {
    log::error!("reset: {step:?} {target} failed: {e}");
    report.failures.push(ResetFailure { target: target.to_string(), step, error: e.to_string() });
}
