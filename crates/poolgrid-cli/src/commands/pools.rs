//! One-shot pool operations against the configured cluster.

use anyhow::anyhow;

use poolgrid_autoscale::{NodePoolProvider, Pool, SizeChange};
use poolgrid_core::PoolgridConfig;
use poolgrid_state::StateStore;

fn provider(config: &PoolgridConfig, store: StateStore) -> anyhow::Result<NodePoolProvider> {
    let provider = NodePoolProvider::from_store(config, store);
    provider.refresh()?;
    Ok(provider)
}

fn pool(provider: &NodePoolProvider, config: &PoolgridConfig, name: &str) -> anyhow::Result<Pool> {
    provider.pool(name).ok_or_else(|| {
        anyhow!(
            "pool {name} is not an autoscaled pool of cluster {}",
            config.cluster_key()
        )
    })
}

fn print_change(pool: &str, change: SizeChange) {
    println!("✓ {pool}: {} → {}", change.from, change.to);
}

pub fn list(config: &PoolgridConfig, store: StateStore) -> anyhow::Result<()> {
    let provider = provider(config, store)?;
    let pools = provider.pools();
    if pools.is_empty() {
        println!("no autoscaled pools in cluster {}", config.cluster_key());
        return Ok(());
    }
    println!("{:<24} {:>5} {:>5} {:>7} {:>5}", "POOL", "MIN", "MAX", "TARGET", "SIZE");
    for p in pools {
        println!(
            "{:<24} {:>5} {:>5} {:>7} {:>5}",
            p.id(),
            p.min_size(),
            p.max_size(),
            p.target_size()?,
            p.size()?
        );
    }
    Ok(())
}

pub fn target_size(config: &PoolgridConfig, store: StateStore, name: &str) -> anyhow::Result<()> {
    let provider = provider(config, store)?;
    println!("{}", pool(&provider, config, name)?.target_size()?);
    Ok(())
}

pub fn size(config: &PoolgridConfig, store: StateStore, name: &str) -> anyhow::Result<()> {
    let provider = provider(config, store)?;
    println!("{}", pool(&provider, config, name)?.size()?);
    Ok(())
}

pub fn increase(
    config: &PoolgridConfig,
    store: StateStore,
    name: &str,
    delta: i32,
) -> anyhow::Result<()> {
    let provider = provider(config, store)?;
    let change = pool(&provider, config, name)?.increase_size(delta)?;
    print_change(name, change);
    Ok(())
}

pub fn decrease(
    config: &PoolgridConfig,
    store: StateStore,
    name: &str,
    delta: i32,
) -> anyhow::Result<()> {
    let provider = provider(config, store)?;
    let change = pool(&provider, config, name)?.decrease_target_size(delta)?;
    print_change(name, change);
    Ok(())
}

pub fn remove(
    config: &PoolgridConfig,
    store: StateStore,
    name: &str,
    machines: &[String],
) -> anyhow::Result<()> {
    let provider = provider(config, store)?;
    pool(&provider, config, name)?.delete_machines(machines)?;
    println!("✓ {name}: {} machine(s) marked for deletion", machines.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use poolgrid_autoscale::ScaleError;
    use poolgrid_core::constants::NODE_POOL_LABEL;
    use poolgrid_state::{AutoscalingOptions, ClusterPhase, ClusterSpec, Machine, NodePool};

    fn seeded() -> (PoolgridConfig, StateStore) {
        let config = PoolgridConfig::for_cluster("kommander", "prod");
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_cluster(&ClusterSpec {
                name: "prod".to_string(),
                namespace: "kommander".to_string(),
                resource_version: 0,
                provisioning_paused: false,
                phase: ClusterPhase::Provisioned,
                node_pools: vec![NodePool {
                    name: "workers".to_string(),
                    count: 3,
                    autoscaling: Some(AutoscalingOptions {
                        min_size: 1,
                        max_size: 5,
                    }),
                    machine_type: None,
                }],
            })
            .unwrap();
        (config, store)
    }

    fn count(store: &StateStore) -> i32 {
        store
            .get_cluster("kommander/prod")
            .unwrap()
            .unwrap()
            .pool("workers")
            .unwrap()
            .count
    }

    #[test]
    fn increase_and_decrease() {
        let (config, store) = seeded();
        increase(&config, store.clone(), "workers", 2).unwrap();
        assert_eq!(count(&store), 5);
        decrease(&config, store.clone(), "workers", -1).unwrap();
        assert_eq!(count(&store), 4);
        assert_eq!(store.list_events(10).unwrap().len(), 2);
    }

    #[test]
    fn increase_past_max_surfaces_scale_error() {
        let (config, store) = seeded();
        let err = increase(&config, store.clone(), "workers", 3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScaleError>(),
            Some(ScaleError::Bounds { .. })
        ));
        assert_eq!(count(&store), 3);
    }

    #[test]
    fn unknown_pool() {
        let (config, store) = seeded();
        let err = target_size(&config, store, "gpu").unwrap_err();
        assert!(err.to_string().contains("not an autoscaled pool"));
    }

    #[test]
    fn remove_marks_machine() {
        let (config, store) = seeded();
        store
            .put_machine(&Machine {
                name: "w0".to_string(),
                provider_id: Some("i-123".to_string()),
                labels: HashMap::from([(NODE_POOL_LABEL.to_string(), "workers".to_string())]),
                annotations: HashMap::new(),
            })
            .unwrap();

        remove(&config, store.clone(), "workers", &["i-123".to_string()]).unwrap();
        assert_eq!(count(&store), 2);
        let w0 = store.get_machine("w0").unwrap().unwrap();
        assert!(w0.deletion_requested().is_some());
    }

    #[test]
    fn missing_cluster_fails_refresh() {
        let config = PoolgridConfig::for_cluster("kommander", "prod");
        let store = StateStore::open_in_memory().unwrap();
        assert!(list(&config, store).is_err());
    }
}
