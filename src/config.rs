//! Cache configuration.
//!
//! Read from `~/.sheltercache/config.json` when present. Every field has a
//! default, so a partial (or missing) file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShelterError};

/// Environment variable that overrides the base directory.
pub const DIR_ENV: &str = "SHELTERCACHE_DIR";

/// Card type that marks a card as a shelter-search result.
pub const DEFAULT_SHELTER_CARD_TYPE: &str = "shelter_search";

/// Default cache size after which a retention warning is logged.
pub const DEFAULT_RETENTION_WARN_THRESHOLD: usize = 5_000;

/// Shelter cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the persisted blobs. `None` means `<base dir>/data`.
    pub data_dir: Option<PathBuf>,
    /// `card_type` value that marks shelter-bearing cards.
    pub shelter_card_type: String,
    /// Log a warning each time the shelter cache grows past a multiple of
    /// this many entries. `0` disables the warning.
    pub retention_warn_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            shelter_card_type: DEFAULT_SHELTER_CARD_TYPE.to_string(),
            retention_warn_threshold: DEFAULT_RETENTION_WARN_THRESHOLD,
        }
    }
}

impl CacheConfig {
    /// Base directory (`$SHELTERCACHE_DIR`, else `~/.sheltercache`).
    pub fn dir() -> PathBuf {
        if let Ok(dir) = std::env::var(DIR_ENV) {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sheltercache")
    }

    /// Default config file path.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default path, falling back to defaults if the file is
    /// absent.
    pub fn load() -> Result<Self> {
        let path = Self::path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    /// Load from an explicit path. The file must exist and parse.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ShelterError::Config(format!("Failed to read config at {:?}: {}", path, e))
        })?;
        serde_json::from_str(&data)
            .map_err(|e| ShelterError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Directory for the persisted blobs.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| Self::dir().join("data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.data_dir, None);
        assert_eq!(cfg.shelter_card_type, "shelter_search");
        assert_eq!(cfg.retention_warn_threshold, 5_000);
    }

    #[test]
    fn test_config_deserialize_partial() {
        let json = r#"{"shelter_card_type": "evac_search"}"#;
        let cfg: CacheConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.shelter_card_type, "evac_search");
        assert_eq!(cfg.retention_warn_threshold, 5_000); // default
    }

    #[test]
    fn test_load_from_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"data_dir": "/var/lib/shelters"}"#).unwrap();

        let cfg = CacheConfig::load_from_path(&path).unwrap();
        assert_eq!(cfg.resolved_data_dir(), PathBuf::from("/var/lib/shelters"));
    }

    #[test]
    fn test_load_from_path_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let err = CacheConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ShelterError::Config(_)));
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let tmp = TempDir::new().unwrap();
        let result = CacheConfig::load_from_path(&tmp.path().join("absent.json"));
        assert!(result.is_err());
    }
}
