//! Store configuration.
//!
//! Precedence: CLI flags > environment > config file > defaults. The binary
//! applies CLI flags on top of what [`StoreConfig::load`] returns.

use crate::collection::CollectionOptions;
use crate::errors::DbError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CACHE_FILE: &str = "localStorage.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    /// Secondary cache file; relative paths resolve against `data_dir`.
    pub cache_file: PathBuf,
    pub fsync: bool,
    pub autocompact_after: usize,
    pub corrupt_threshold: f64,
    pub clean_marker_ttl_secs: u64,
    pub reload_delay_ms: u64,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    /// A log4rs YAML file; takes precedence over `log_dir`.
    pub log_config: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    match dirs_next::data_dir() {
        Some(d) => d.join("ledgerlite"),
        None => crate::fsutil::normalize_data_dir(None),
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let col = CollectionOptions::default();
        Self {
            data_dir: default_data_dir(),
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            fsync: col.fsync,
            autocompact_after: col.autocompact_after,
            corrupt_threshold: col.corrupt_threshold,
            clean_marker_ttl_secs: 30,
            reload_delay_ms: 500,
            log_dir: None,
            log_level: None,
            log_config: None,
        }
    }
}

impl StoreConfig {
    /// Defaults rooted at `dir`.
    #[must_use]
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: dir.into(), ..Self::default() }
    }

    /// Candidate config files in precedence order.
    #[must_use]
    pub fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = vec![];
        if let Some(p) = explicit {
            paths.push(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("LEDGERLITE_CONFIG") {
            paths.push(PathBuf::from(p));
        }
        if let Some(cfg) = dirs_next::config_dir() {
            paths.push(cfg.join("ledgerlite.toml"));
        }
        if let Ok(cur) = std::env::current_dir() {
            paths.push(cur.join("ledgerlite.toml"));
        }
        paths
    }

    /// Load the first config file found (if any), then overlay the environment.
    ///
    /// # Errors
    /// `Config` if an explicitly named file is missing, or any found file does not parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DbError> {
        if let Some(p) = explicit
            && !p.exists()
        {
            return Err(DbError::Config(format!("config file not found: {}", p.display())));
        }
        let mut cfg = match Self::search_paths(explicit).into_iter().find(|p| p.exists()) {
            Some(p) => {
                let text = std::fs::read_to_string(&p)
                    .map_err(|e| DbError::Config(format!("{}: {e}", p.display())))?;
                log::debug!("loading config from {}", p.display());
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// `Config` if the text is not valid TOML for this struct.
    pub fn from_toml_str(text: &str) -> Result<Self, DbError> {
        let cfg: Self = toml::from_str(text).map_err(|e| DbError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay values from an environment lookup.
    ///
    /// # Errors
    /// `Config` when a variable is set but does not parse.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<(), DbError> {
        fn parse<T: std::str::FromStr>(key: &str, v: &str) -> Result<T, DbError> {
            v.trim().parse().map_err(|_| DbError::Config(format!("{key}: cannot parse '{v}'")))
        }
        if let Some(v) = get("LEDGERLITE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("LEDGERLITE_CACHE_FILE") {
            self.cache_file = PathBuf::from(v);
        }
        if let Some(v) = get("LEDGERLITE_FSYNC") {
            self.fsync = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = get("LEDGERLITE_AUTOCOMPACT_AFTER") {
            self.autocompact_after = parse("LEDGERLITE_AUTOCOMPACT_AFTER", &v)?;
        }
        if let Some(v) = get("LEDGERLITE_CORRUPT_THRESHOLD") {
            self.corrupt_threshold = parse("LEDGERLITE_CORRUPT_THRESHOLD", &v)?;
        }
        if let Some(v) = get("LEDGERLITE_CLEAN_MARKER_TTL") {
            self.clean_marker_ttl_secs = parse("LEDGERLITE_CLEAN_MARKER_TTL", &v)?;
        }
        if let Some(v) = get("LEDGERLITE_RELOAD_DELAY_MS") {
            self.reload_delay_ms = parse("LEDGERLITE_RELOAD_DELAY_MS", &v)?;
        }
        if let Some(v) = get("LEDGERLITE_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("LEDGERLITE_LOG_LEVEL") {
            self.log_level = Some(v);
        }
        if let Some(v) = get("LEDGERLITE_LOG_CONFIG") {
            self.log_config = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// # Errors
    /// `Config` if a value is out of range.
    pub fn validate(&self) -> Result<(), DbError> {
        if !(0.0..=1.0).contains(&self.corrupt_threshold) {
            return Err(DbError::Config(format!(
                "corrupt_threshold must be within 0..=1, got {}",
                self.corrupt_threshold
            )));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(DbError::Config("data_dir is empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        if self.cache_file.is_absolute() {
            self.cache_file.clone()
        } else {
            self.data_dir.join(&self.cache_file)
        }
    }

    #[must_use]
    pub fn collection_options(&self) -> CollectionOptions {
        CollectionOptions {
            fsync: self.fsync,
            autocompact_after: self.autocompact_after,
            corrupt_threshold: self.corrupt_threshold,
        }
    }

    #[must_use]
    pub fn clean_marker_ttl(&self) -> chrono::Duration {
        let secs = i64::try_from(self.clean_marker_ttl_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        chrono::Duration::seconds(secs)
    }

    #[must_use]
    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn toml_overrides_only_named_fields() {
        let cfg = StoreConfig::from_toml_str(
            r#"
            data_dir = "/tmp/ll"
            fsync = true
            clean_marker_ttl_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/ll"));
        assert!(cfg.fsync);
        assert_eq!(cfg.clean_marker_ttl_secs, 60);
        assert_eq!(cfg.reload_delay_ms, 500);
        assert_eq!(cfg.cache_path(), PathBuf::from("/tmp/ll/localStorage.json"));
    }

    #[test]
    fn env_overlays_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LEDGERLITE_DATA_DIR", "/srv/ledger"),
            ("LEDGERLITE_FSYNC", "yes"),
            ("LEDGERLITE_AUTOCOMPACT_AFTER", "10"),
        ]);
        let mut cfg = StoreConfig::for_dir("/tmp/other");
        cfg.apply_env(|k| env.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/ledger"));
        assert!(cfg.fsync);
        assert_eq!(cfg.autocompact_after, 10);
    }

    #[test]
    fn bad_values_are_config_errors() {
        let mut cfg = StoreConfig::for_dir("/tmp/x");
        let err = cfg
            .apply_env(|k| (k == "LEDGERLITE_RELOAD_DELAY_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
        assert!(StoreConfig::from_toml_str("corrupt_threshold = 2.0").is_err());
        assert!(StoreConfig::load(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }
}
