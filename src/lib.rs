pub mod bridge;
pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod errors;
pub mod fallback;
pub mod fsutil;
pub mod kv;
pub mod logger;
pub mod query;
pub mod registry;
pub mod types;

use crate::bridge::Bridge;
use crate::config::StoreConfig;
use crate::errors::DbError;
use crate::fallback::{CleanMarker, Recovered, RecoveringReader, ResetReport, Resetter};
use crate::kv::KvStore;
use crate::registry::{Registry, RegistryBuilder};
use std::sync::Arc;

/// Everything a host process needs: the registry, the secondary cache, and
/// the clean marker that ties them together across a reset.
pub struct Store {
    config: StoreConfig,
    registry: Arc<Registry>,
    kv: Arc<KvStore>,
    marker: Arc<CleanMarker>,
    reloaded_after_reset: bool,
}

impl Store {
    /// Open the default collection set described by `config`.
    ///
    /// # Errors
    /// `Config` for an invalid config, `StorageFault` if the data directory or
    /// the secondary cache cannot be opened.
    pub fn open(config: StoreConfig) -> Result<Self, DbError> {
        let builder = RegistryBuilder::new(&config);
        Self::open_with(config, builder)
    }

    /// Like [`Store::open`], with a caller-supplied registry (extra legacy collections).
    ///
    /// # Errors
    /// See [`Store::open`].
    pub fn open_with(config: StoreConfig, builder: RegistryBuilder) -> Result<Self, DbError> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            DbError::StorageFault(format!("cannot create {}: {e}", config.data_dir.display()))
        })?;
        let kv = Arc::new(KvStore::open(config.cache_path())?);
        let marker = Arc::new(CleanMarker::new(Arc::clone(&kv), config.clean_marker_ttl()));
        let reloaded_after_reset = marker.take_force_reload();
        if reloaded_after_reset {
            log::info!("loading from a freshly cleaned store");
        }
        let skip = marker.skip_seed();
        let registry = Arc::new(builder.open(skip)?);
        if skip.is_active()
            && let Err(e) = marker.acknowledge()
        {
            log::warn!("clean marker not cleared: {e}");
        }
        Ok(Self { config, registry, kv, marker, reloaded_after_reset })
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn kv(&self) -> &Arc<KvStore> {
        &self.kv
    }

    #[must_use]
    pub fn marker(&self) -> &Arc<CleanMarker> {
        &self.marker
    }

    /// True if this open consumed a reset's force-reload request.
    #[must_use]
    pub fn reloaded_after_reset(&self) -> bool {
        self.reloaded_after_reset
    }

    #[must_use]
    pub fn reader(&self) -> RecoveringReader {
        RecoveringReader::standard(Arc::clone(&self.registry), Arc::clone(&self.kv))
    }

    /// Fallback read of a dataset by name or alias.
    ///
    /// # Errors
    /// `UnknownCollection` if the name matches no dataset.
    pub fn recover(&self, dataset: &str) -> Result<Recovered, DbError> {
        self.reader().read_named(dataset)
    }

    #[must_use]
    pub fn resetter(&self) -> Resetter {
        Resetter::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.kv),
            Arc::clone(&self.marker),
            self.config.reload_delay(),
        )
    }

    /// Destructive reset of every dataset. See [`Resetter::clean_database`].
    #[must_use]
    pub fn clean_database(&self) -> ResetReport {
        self.resetter().clean_database()
    }

    /// Serve the registry over the async bridge. Requires a tokio runtime.
    #[must_use]
    pub fn spawn_bridge(&self) -> Bridge {
        Bridge::spawn(Arc::clone(&self.registry))
    }
}
