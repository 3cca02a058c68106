//! Sync configuration
//!
//! Loaded from TOML. A `[presets]` table replaces the built-in War Room
//! presets as a whole.
//!
//! ```toml
//! replay_latest_on_register = true
//! stale_after_secs = 30
//!
//! [presets.blockers]
//! collection = "blockers"
//! order_by_field = "impact"
//! direction = "desc"
//! ```

use crate::dashboard;
use crate::error::ConfigError;
use crate::types::{CollectionRef, QueryOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Named (collection, query) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Subscribed collection
    pub collection: CollectionRef,
    /// Query options
    #[serde(flatten)]
    pub query: QueryOptions,
}

impl Preset {
    /// Create preset
    #[inline]
    pub fn new(collection: impl Into<CollectionRef>, query: QueryOptions) -> Self {
        Self {
            collection: collection.into(),
            query,
        }
    }
}

/// Live sync configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Invoke a newly registered listener with the cached view, if any
    pub replay_latest_on_register: bool,
    /// Watchdog threshold: no snapshot within this many seconds means stale
    pub stale_after_secs: Option<u64>,
    /// Named queries for `open_named`
    pub presets: BTreeMap<String, Preset>,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With watchdog threshold
    #[inline]
    #[must_use]
    pub fn with_stale_after(mut self, after: Duration) -> Self {
        self.stale_after_secs = Some(after.as_secs());
        self
    }

    /// Without replay of the cached view on listener registration
    #[inline]
    #[must_use]
    pub fn without_replay(mut self) -> Self {
        self.replay_latest_on_register = false;
        self
    }

    /// With an additional or replaced preset
    #[inline]
    #[must_use]
    pub fn with_preset(mut self, name: impl Into<String>, preset: Preset) -> Self {
        self.presets.insert(name.into(), preset);
        self
    }

    /// Watchdog threshold as a duration
    #[inline]
    #[must_use]
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }

    /// Look up preset by name
    #[inline]
    #[must_use]
    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    /// Parse and validate TOML configuration
    ///
    /// # Errors
    /// - `ConfigError::Parse` if the TOML does not match the schema
    /// - `ConfigError::InvalidPreset` if a preset query is malformed
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - any error of [`SyncConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Validate every preset
    ///
    /// # Errors
    /// `ConfigError::InvalidPreset` naming the first malformed preset
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, preset) in &self.presets {
            let result = if preset.collection.is_empty() {
                Err(crate::error::QueryError::EmptyCollection)
            } else {
                preset.query.validate()
            };
            result.map_err(|source| ConfigError::InvalidPreset {
                name: name.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            replay_latest_on_register: true,
            stale_after_secs: None,
            presets: dashboard::default_presets(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    #[test]
    fn default_has_war_room_presets() {
        let config = SyncConfig::default();
        assert!(config.replay_latest_on_register);
        assert!(config.validate().is_ok());
        for name in ["blockers", "pipeline", "network", "agents", "chat", "logs"] {
            assert!(config.preset(name).is_some(), "missing preset {name}");
        }
    }

    #[test]
    fn empty_toml_keeps_defaults() {
        let config = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn toml_presets_replace_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            stale_after_secs = 30

            [presets.hot]
            collection = "blockers"
            order_by_field = "impact"
            direction = "desc"
            limit = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.stale_after(), Some(Duration::from_secs(30)));
        assert_eq!(config.presets.len(), 1);
        let hot = config.preset("hot").unwrap();
        assert_eq!(hot.collection, CollectionRef::new("blockers"));
        assert_eq!(
            hot.query,
            QueryOptions::new().order_by("impact", Direction::Desc).with_limit(5)
        );
    }

    #[test]
    fn invalid_preset_rejected() {
        let err = SyncConfig::from_toml_str(
            r#"
            [presets.broken]
            collection = "blockers"
            limit = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPreset { ref name, .. } if name == "broken"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = SyncConfig::load("/nonexistent/warroom.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warroom.toml");
        std::fs::write(&path, "replay_latest_on_register = false\n").unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert!(!config.replay_latest_on_register);
    }
}
