//! TOML configuration for cctvsentinel.
//!
//! Layered the same way for every command: an explicit `--config` path, the
//! `CCTVSENTINEL_CONFIG` environment variable, `./cctvsentinel.toml`, then
//! compiled-in defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "CCTVSENTINEL_CONFIG";

/// Config file picked up from the working directory when nothing else is set.
pub const LOCAL_CONFIG: &str = "cctvsentinel.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for a sentinel run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    /// Raw detector label -> anomaly category.
    #[serde(default = "default_categories")]
    pub categories: BTreeMap<String, String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            confirmation: ConfirmationConfig::default(),
            categories: default_categories(),
            storage: StorageConfig::default(),
            response: ResponseConfig::default(),
            evidence: EvidenceConfig::default(),
        }
    }
}

impl SentinelConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded sentinel configuration");
        Ok(config)
    }

    /// Resolve configuration for this process.
    ///
    /// An explicit path must load; the fallbacks only warn and move on.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "CCTVSENTINEL_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.confirmation.required_consecutive_frames == 0 {
            bail!("confirmation.required_consecutive_frames must be at least 1");
        }
        if self.confirmation.short_term_window == 0 {
            bail!("confirmation.short_term_window must be at least 1");
        }
        if self.storage.path.as_os_str().is_empty() {
            bail!("storage.path must not be empty");
        }
        for (label, category) in &self.categories {
            if label.trim().is_empty() || category.trim().is_empty() {
                bail!("categories: empty label or category in mapping {label:?} -> {category:?}");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Fixed identifiers stamped onto every incident of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub camera_id: String,
    pub location: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            camera_id: "CAM-001".to_string(),
            location: "Main Entrance".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Confirmation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Consecutive frames a category must be seen in before it confirms.
    pub required_consecutive_frames: u32,
    /// Number of recent frame observations kept in short-term memory.
    pub short_term_window: usize,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            required_consecutive_frames: 3,
            short_term_window: 3,
        }
    }
}

fn default_categories() -> BTreeMap<String, String> {
    [
        ("person", "theft"),
        ("car", "accident"),
        ("fire hydrant", "fire"),
        ("bottle", "smoke"),
        ("knife", "weapon"),
        ("scissors", "weapon"),
    ]
    .into_iter()
    .map(|(label, category)| (label.to_string(), category.to_string()))
    .collect()
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Where the long-term incident history lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Json,
            path: PathBuf::from("data/incident_history.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    /// A single pretty-printed JSON document holding every incident.
    Json,
    /// SQLite database with one row per incident and per action.
    Sqlite,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Dispatch table used by the built-in responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Target used for categories missing from `targets`.
    pub default_target: String,
    /// Anomaly category -> service alerted for it.
    pub targets: BTreeMap<String, String>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        let targets = [
            ("fire", "Fire Department"),
            ("smoke", "Fire Department"),
            ("weapon", "Police"),
            ("fall", "Medical Unit"),
            ("fight", "Police"),
            ("accident", "Ambulance"),
            ("theft", "Police"),
        ]
        .into_iter()
        .map(|(category, target)| (category.to_string(), target.to_string()))
        .collect();

        Self {
            default_target: "General Emergency".to_string(),
            targets,
        }
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Directory frame snapshots are expected under.
    pub snapshot_dir: PathBuf,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("data/snapshots"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = SentinelConfig::default();

        assert_eq!(cfg.session.camera_id, "CAM-001");
        assert_eq!(cfg.session.location, "Main Entrance");

        assert_eq!(cfg.confirmation.required_consecutive_frames, 3);
        assert_eq!(cfg.confirmation.short_term_window, 3);

        assert_eq!(cfg.categories.get("person").map(String::as_str), Some("theft"));
        assert_eq!(cfg.categories.get("knife").map(String::as_str), Some("weapon"));
        assert_eq!(cfg.categories.len(), 6);

        assert_eq!(cfg.storage.backend, StorageBackendKind::Json);
        assert_eq!(cfg.storage.path, PathBuf::from("data/incident_history.json"));

        assert_eq!(cfg.response.default_target, "General Emergency");
        assert_eq!(cfg.response.targets.get("fire").map(String::as_str), Some("Fire Department"));

        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: SentinelConfig = toml::from_str(
            r#"
            [confirmation]
            required_consecutive_frames = 5

            [storage]
            backend = "sqlite"
            path = "/tmp/history.db"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.confirmation.required_consecutive_frames, 5);
        assert_eq!(cfg.confirmation.short_term_window, 3);
        assert_eq!(cfg.storage.backend, StorageBackendKind::Sqlite);
        assert_eq!(cfg.session.camera_id, "CAM-001");
        assert_eq!(cfg.categories.len(), 6);
    }

    #[test]
    fn test_custom_categories_replace_defaults() {
        let cfg: SentinelConfig = toml::from_str(
            r#"
            [categories]
            "flame" = "fire"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.categories.len(), 1);
        assert_eq!(cfg.categories.get("flame").map(String::as_str), Some("fire"));
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut cfg = SentinelConfig::default();
        cfg.confirmation.required_consecutive_frames = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = SentinelConfig::default();
        cfg.confirmation.short_term_window = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_category() {
        let mut cfg = SentinelConfig::default();
        cfg.categories.insert("dog".to_string(), " ".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentinel.toml");
        std::fs::write(
            &path,
            r#"
            [session]
            camera_id = "CAM-042"
            location = "Loading Dock"
            "#,
        )
        .unwrap();

        let cfg = SentinelConfig::resolve(Some(path.as_path())).unwrap();
        assert_eq!(cfg.session.camera_id, "CAM-042");
        assert_eq!(cfg.session.location, "Loading Dock");
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(SentinelConfig::resolve(Some(missing.as_path())).is_err());
    }
}
