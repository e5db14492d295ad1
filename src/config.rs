use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Default archive root on an IRIS server.
pub const DEFAULT_BASE_PATH: &str = "/var/lib/iris/traffic";

/// Default district namespace.
pub const DEFAULT_DISTRICT: &str = "tms";

/// Location of the traffic archive and the district served by default.
///
/// May be stored as a JSON file on disk; missing keys take their defaults:
/// ```json
/// {
///   "base_path": "/var/lib/iris/traffic",
///   "district": "tms"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub base_path: PathBuf,
    pub district: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(DEFAULT_BASE_PATH),
            district: DEFAULT_DISTRICT.to_string(),
        }
    }
}

impl ArchiveConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Reads `TRAFDAT_BASE_PATH` and `TRAFDAT_DISTRICT`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_path: std::env::var_os("TRAFDAT_BASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.base_path),
            district: std::env::var("TRAFDAT_DISTRICT").unwrap_or(defaults.district),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArchiveConfig::default();
        assert_eq!(config.base_path, PathBuf::from("/var/lib/iris/traffic"));
        assert_eq!(config.district, "tms");
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: ArchiveConfig = serde_json::from_str(r#"{"district": "d7"}"#).unwrap();
        assert_eq!(config.district, "d7");
        assert_eq!(config.base_path, PathBuf::from(DEFAULT_BASE_PATH));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trafdat.json");
        std::fs::write(&path, r#"{"base_path": "/srv/traffic", "district": "d1"}"#).unwrap();
        let config = ArchiveConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.base_path, PathBuf::from("/srv/traffic"));
        assert_eq!(config.district, "d1");
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(ArchiveConfig::load("/nonexistent/trafdat.json").is_err());
    }
}
