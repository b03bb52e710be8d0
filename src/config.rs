//! Configuration Management
//!
//! Persistent settings for tdmesh, stored as JSON under the user config dir.

use crate::gcp::client::ApiEndpoints;
use crate::gcp::poll::PollPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default prefix for every managed resource name
pub const DEFAULT_RESOURCE_PREFIX: &str = "xds-k8s";

/// Google health checker ranges
pub const DEFAULT_FIREWALL_SOURCE_RANGES: &[&str] = &["35.191.0.0/16", "130.211.0.0/22"];

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GCP project ID
    pub project: Option<String>,
    /// VPC network the mesh lives in
    pub network: String,
    pub resource_prefix: String,
    /// Fixed suffix; generated per run when unset
    pub resource_suffix: Option<String>,
    pub firewall_source_ranges: Vec<String>,
    pub polling: PollPolicy,
    pub endpoints: ApiEndpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: None,
            network: "default".to_string(),
            resource_prefix: DEFAULT_RESOURCE_PREFIX.to_string(),
            resource_suffix: None,
            firewall_source_ranges: DEFAULT_FIREWALL_SOURCE_RANGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            polling: PollPolicy::default(),
            endpoints: ApiEndpoints::default(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tdmesh").join("config.json"))
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {:?}: {:#}", path, e);
                Self::default()
            },
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config
            .polling
            .validate()
            .with_context(|| format!("Invalid polling settings in {:?}", path))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective project (CLI > config > gcloud default)
    pub fn effective_project(&self, cli: Option<&str>) -> Option<String> {
        cli.map(|s| s.to_string())
            .or_else(|| self.project.clone())
            .or_else(crate::gcp::auth::get_default_project)
    }

    /// Get effective suffix (CLI > config > generated)
    pub fn effective_resource_suffix(&self, cli: Option<&str>) -> String {
        self.configured_resource_suffix(cli)
            .unwrap_or_else(generate_resource_suffix)
    }

    /// Suffix of resources created by an earlier run (CLI > config)
    ///
    /// Never generated: a fresh suffix names nothing that exists.
    pub fn required_resource_suffix(&self, cli: Option<&str>) -> Result<String> {
        self.configured_resource_suffix(cli)
            .context("No resource suffix configured. Pass the --resource-suffix printed by setup")
    }

    fn configured_resource_suffix(&self, cli: Option<&str>) -> Option<String> {
        cli.map(|s| s.to_string())
            .or_else(|| self.resource_suffix.clone())
    }
}

/// `<yyyymmdd-hhmm>-<5 hex chars>`, unique enough per test run
pub fn generate_resource_suffix() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M");
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", timestamp, &id[..5])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.network, "default");
        assert_eq!(config.resource_prefix, DEFAULT_RESOURCE_PREFIX);
        assert_eq!(config.firewall_source_ranges.len(), 2);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            project: Some("grpc-testing".to_string()),
            resource_suffix: Some("run1".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.project.as_deref(), Some("grpc-testing"));
        assert_eq!(loaded.resource_suffix.as_deref(), Some("run1"));
        assert_eq!(loaded.polling, PollPolicy::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"network": "mesh", "polling": {"max_elapsed_secs": 60}}"#,
        )
        .unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.network, "mesh");
        assert_eq!(loaded.resource_prefix, DEFAULT_RESOURCE_PREFIX);
        assert_eq!(loaded.polling.max_elapsed_secs, 60);
        assert_eq!(loaded.polling.initial_interval_ms, PollPolicy::default().initial_interval_ms);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = Config {
            project: Some("from-config".to_string()),
            resource_suffix: Some("cfg".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.effective_project(Some("from-cli")).as_deref(),
            Some("from-cli")
        );
        assert_eq!(config.effective_project(None).as_deref(), Some("from-config"));
        assert_eq!(config.effective_resource_suffix(Some("cli")), "cli");
        assert_eq!(config.effective_resource_suffix(None), "cfg");
    }

    #[test]
    fn test_required_suffix_is_never_generated() {
        let config = Config::default();
        assert!(config.required_resource_suffix(None).is_err());
        assert_eq!(config.required_resource_suffix(Some("run1")).unwrap(), "run1");

        let configured = Config {
            resource_suffix: Some("cfg".to_string()),
            ..Config::default()
        };
        assert_eq!(configured.required_resource_suffix(None).unwrap(), "cfg");
    }

    #[test]
    fn test_invalid_polling_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        for polling in [
            r#"{"multiplier": -2.0}"#,
            r#"{"multiplier": 0.5}"#,
            r#"{"randomization_factor": -0.5}"#,
            r#"{"randomization_factor": 2.0}"#,
        ] {
            std::fs::write(&path, format!(r#"{{"polling": {}}}"#, polling)).unwrap();
            let err = Config::load_from(&path).unwrap_err();
            assert!(format!("{:#}", err).contains("polling"), "{polling} accepted");
        }
    }

    #[test]
    fn test_generated_suffix_shape() {
        let suffix = generate_resource_suffix();
        // yyyymmdd-hhmm-xxxxx
        assert_eq!(suffix.len(), 19);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-' || c.is_ascii_hexdigit()));
    }
}
