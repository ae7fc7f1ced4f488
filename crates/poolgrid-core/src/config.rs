//! poolgrid.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::DEFAULT_GPU_LABEL;
use crate::duration::parse_duration_secs;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolgridConfig {
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub autoscaler: AutoscalerConfig,
    #[serde(default)]
    pub gpu: GpuConfig,
}

/// Which ClusterSpec object this process reconciles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoscalerConfig {
    /// How often the pool registry is refreshed (e.g., "30s").
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuConfig {
    #[serde(default = "default_gpu_label")]
    pub label: String,
    #[serde(default = "default_gpu_types")]
    pub types: Vec<String>,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/poolgrid/poolgrid.redb")
}

fn default_refresh_interval() -> String {
    "30s".to_string()
}

fn default_gpu_label() -> String {
    DEFAULT_GPU_LABEL.to_string()
}

fn default_gpu_types() -> Vec<String> {
    vec![
        "nvidia-tesla-k80".to_string(),
        "nvidia-tesla-p100".to_string(),
        "nvidia-tesla-v100".to_string(),
    ]
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
        }
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            label: default_gpu_label(),
            types: default_gpu_types(),
        }
    }
}

impl PoolgridConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: PoolgridConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Minimal config for a cluster, everything else defaulted.
    pub fn for_cluster(namespace: &str, name: &str) -> Self {
        Self {
            cluster: ClusterConfig {
                name: name.to_string(),
                namespace: namespace.to_string(),
            },
            store: StoreConfig::default(),
            autoscaler: AutoscalerConfig::default(),
            gpu: GpuConfig::default(),
        }
    }

    /// Store key of the reconciled ClusterSpec (`{namespace}/{name}`).
    pub fn cluster_key(&self) -> String {
        format!("{}/{}", self.cluster.namespace, self.cluster.name)
    }

    pub fn refresh_interval(&self) -> Duration {
        // validate() already rejected unparseable values.
        Duration::from_secs(parse_duration_secs(&self.autoscaler.refresh_interval).unwrap_or(30))
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.cluster.name.trim().is_empty() {
            return Err(ConfigError::Invalid("cluster.name must not be empty".to_string()));
        }
        match parse_duration_secs(&self.autoscaler.refresh_interval) {
            Some(0) | None => Err(ConfigError::Invalid(format!(
                "autoscaler.refresh_interval {:?} is not a positive duration",
                self.autoscaler.refresh_interval
            ))),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let toml_str = r#"
[cluster]
name = "prod"
"#;
        let config = PoolgridConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.cluster.name, "prod");
        assert_eq!(config.cluster.namespace, "default");
        assert_eq!(config.cluster_key(), "default/prod");
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.gpu.types.len(), 3);
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
[cluster]
name = "prod"
namespace = "kommander"

[store]
path = "/tmp/pg.redb"

[autoscaler]
refresh_interval = "2m"

[gpu]
label = "example.com/gpu"
types = ["a100"]
"#;
        let config = PoolgridConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.cluster_key(), "kommander/prod");
        assert_eq!(config.store.path, PathBuf::from("/tmp/pg.redb"));
        assert_eq!(config.refresh_interval(), Duration::from_secs(120));
        assert_eq!(config.gpu.types, vec!["a100".to_string()]);
    }

    #[test]
    fn test_rejects_empty_cluster_name() {
        let err = PoolgridConfig::from_toml_str("[cluster]\nname = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_interval() {
        let toml_str = r#"
[cluster]
name = "prod"

[autoscaler]
refresh_interval = "soon"
"#;
        let err = PoolgridConfig::from_toml_str(toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poolgrid.toml");
        let config = PoolgridConfig::for_cluster("kommander", "edge");
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = PoolgridConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let err = PoolgridConfig::from_file(Path::new("/nonexistent/poolgrid.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
