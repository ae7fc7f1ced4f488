//! `poolgrid apply-cluster` and `apply-machine` seed the state store from
//! JSON documents.

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;

use poolgrid_state::{ClusterSpec, Machine, StateStore};

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Unconditional create-or-replace; the stored version is bumped.
pub fn cluster(store: &StateStore, path: &Path) -> anyhow::Result<()> {
    let spec: ClusterSpec = read_json(path)?;
    let version = store.put_cluster(&spec)?;
    println!(
        "✓ cluster {} applied ({} pools, version {version})",
        spec.table_key(),
        spec.node_pools.len()
    );
    Ok(())
}

pub fn machine(store: &StateStore, path: &Path) -> anyhow::Result<()> {
    let machine: Machine = read_json(path)?;
    store.put_machine(&machine)?;
    match machine.pool_label() {
        Some(pool) => println!("✓ machine {} applied (pool {pool})", machine.name),
        None => println!("✓ machine {} applied", machine.name),
    }
    Ok(())
}
