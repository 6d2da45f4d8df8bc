use crate::errors::DbError;
use crate::kv::KvStore;
use crate::registry::SkipSeed;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

pub const JUST_CLEANED_KEY: &str = "__ledgerlite.justCleanedUntil";
pub const FORCE_RELOAD_KEY: &str = "__ledgerlite.forceCleanReload";

/// "Just cleaned" state shared by the reset path and the next startup.
///
/// Held in memory for the running process and mirrored into the secondary
/// cache so a restart inside the window still sees it.
#[derive(Debug)]
pub struct CleanMarker {
    kv: Arc<KvStore>,
    ttl: Duration,
    until: Mutex<Option<DateTime<Utc>>>,
}

impl CleanMarker {
    #[must_use]
    pub fn new(kv: Arc<KvStore>, ttl: Duration) -> Self {
        let until = match kv.get(JUST_CLEANED_KEY) {
            Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(t) => Some(t.with_timezone(&Utc)),
                Err(e) => {
                    log::warn!("ignoring unreadable clean marker {raw:?}: {e}");
                    None
                }
            },
            None => None,
        };
        Self { kv, ttl, until: Mutex::new(until) }
    }

    /// Start a fresh window at `now`. Returns its expiry.
    ///
    /// # Errors
    /// `StorageFault` if the persisted copy cannot be written; the in-memory
    /// marker is set regardless.
    pub fn mark_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, DbError> {
        let until = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        *self.until.lock() = Some(until);
        self.kv.set(JUST_CLEANED_KEY, until.to_rfc3339())?;
        Ok(until)
    }

    pub fn mark(&self) -> Result<DateTime<Utc>, DbError> {
        self.mark_at(Utc::now())
    }

    /// The seeding decision for a registry opened at `now`. An expired marker is dropped.
    #[must_use]
    pub fn skip_seed_at(&self, now: DateTime<Utc>) -> SkipSeed {
        let mut guard = self.until.lock();
        match *guard {
            Some(until) if now < until => SkipSeed::Until(until),
            Some(_) => {
                *guard = None;
                drop(guard);
                if let Err(e) = self.kv.remove(JUST_CLEANED_KEY) {
                    log::warn!("cannot drop expired clean marker: {e}");
                }
                SkipSeed::No
            }
            None => SkipSeed::No,
        }
    }

    #[must_use]
    pub fn skip_seed(&self) -> SkipSeed {
        self.skip_seed_at(Utc::now())
    }

    /// Clear the marker once a load after a reset has completed.
    ///
    /// # Errors
    /// `StorageFault` if the persisted copy cannot be removed.
    pub fn acknowledge(&self) -> Result<(), DbError> {
        *self.until.lock() = None;
        self.kv.remove(JUST_CLEANED_KEY)?;
        Ok(())
    }

    /// # Errors
    /// `StorageFault` if the flag cannot be persisted.
    pub fn set_force_reload(&self) -> Result<(), DbError> {
        self.kv.set(FORCE_RELOAD_KEY, "true")
    }

    /// One-shot: true if a reset requested a clean reload since the last call.
    #[must_use]
    pub fn take_force_reload(&self) -> bool {
        match self.kv.get(FORCE_RELOAD_KEY) {
            Some(v) => {
                if let Err(e) = self.kv.remove(FORCE_RELOAD_KEY) {
                    log::warn!("cannot consume force-reload flag: {e}");
                }
                v == "true"
            }
            None => false,
        }
    }
}
