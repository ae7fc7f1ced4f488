//! Resolve the effective configuration from `poolgrid.toml` and flags.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Args;
use tracing::info;

use poolgrid_core::PoolgridConfig;
use poolgrid_state::StateStore;

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Path to poolgrid.toml.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Cluster name (overrides [cluster].name).
    #[arg(long, global = true)]
    pub cluster: Option<String>,

    /// Cluster namespace (overrides [cluster].namespace).
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// State store file (overrides [store].path).
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

/// File values first, then flag overrides. Without a config file the
/// cluster name must come from `--cluster`.
pub fn load(args: &ConfigArgs) -> anyhow::Result<PoolgridConfig> {
    let mut config = match (&args.config, &args.cluster) {
        (Some(path), _) => PoolgridConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(name)) => PoolgridConfig::for_cluster("default", name),
        (None, None) => bail!("no cluster selected: pass --config or --cluster"),
    };

    if let Some(name) = &args.cluster {
        config.cluster.name = name.clone();
    }
    if let Some(namespace) = &args.namespace {
        config.cluster.namespace = namespace.clone();
    }
    if let Some(store) = &args.store {
        config.store.path = store.clone();
    }
    if config.cluster.name.trim().is_empty() {
        bail!("cluster name must not be empty");
    }
    Ok(config)
}

pub fn open_store(config: &PoolgridConfig) -> anyhow::Result<StateStore> {
    let path = &config.store.path;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating store directory {}", dir.display()))?;
    }
    let store = StateStore::open(path)?;
    info!(path = %path.display(), cluster = %config.cluster_key(), "state store opened");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_flag_without_file() {
        let args = ConfigArgs {
            cluster: Some("prod".to_string()),
            namespace: Some("kommander".to_string()),
            ..Default::default()
        };
        let config = load(&args).unwrap();
        assert_eq!(config.cluster_key(), "kommander/prod");
    }

    #[test]
    fn nothing_selected_is_an_error() {
        assert!(load(&ConfigArgs::default()).is_err());
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poolgrid.toml");
        std::fs::write(
            &path,
            r#"
[cluster]
name = "prod"
namespace = "kommander"

[autoscaler]
refresh_interval = "1m"
"#,
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(path),
            namespace: Some("staging".to_string()),
            store: Some(dir.path().join("state.redb")),
            ..Default::default()
        };
        let config = load(&args).unwrap();
        assert_eq!(config.cluster_key(), "staging/prod");
        assert_eq!(config.store.path, dir.path().join("state.redb"));
        assert_eq!(config.refresh_interval().as_secs(), 60);
    }

    #[test]
    fn open_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PoolgridConfig::for_cluster("default", "prod");
        config.store.path = dir.path().join("nested").join("poolgrid.redb");

        let store = open_store(&config).unwrap();
        assert!(store.list_clusters().unwrap().is_empty());
        assert!(config.store.path.exists());
    }
}
