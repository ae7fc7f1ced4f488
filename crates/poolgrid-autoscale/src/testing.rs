//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use poolgrid_core::constants::NODE_POOL_LABEL;
use poolgrid_state::*;

use crate::cluster::ClusterSpecStore;

pub const CLUSTER_KEY: &str = "kommander/prod";

/// Cluster with an autoscaled "workers" pool, an autoscaled "gpu" pool,
/// and a fixed-size "static" pool.
pub fn test_cluster(count: i32, min: i32, max: i32) -> ClusterSpec {
    ClusterSpec {
        name: "prod".to_string(),
        namespace: "kommander".to_string(),
        resource_version: 0,
        provisioning_paused: false,
        phase: ClusterPhase::Provisioned,
        node_pools: vec![
            NodePool {
                name: "workers".to_string(),
                count,
                autoscaling: Some(AutoscalingOptions {
                    min_size: min,
                    max_size: max,
                }),
                machine_type: Some("m5.xlarge".to_string()),
            },
            NodePool {
                name: "static".to_string(),
                count: 2,
                autoscaling: None,
                machine_type: None,
            },
            NodePool {
                name: "gpu".to_string(),
                count: 1,
                autoscaling: Some(AutoscalingOptions {
                    min_size: 0,
                    max_size: 4,
                }),
                machine_type: Some("p3.2xlarge".to_string()),
            },
        ],
    }
}

/// Machine `{pool}-{index}` with provider id `i-{pool}-{index}`.
pub fn test_machine(pool: &str, index: usize) -> Machine {
    Machine {
        name: format!("{pool}-{index}"),
        provider_id: Some(format!("i-{pool}-{index}")),
        labels: HashMap::from([(NODE_POOL_LABEL.to_string(), pool.to_string())]),
        annotations: HashMap::new(),
    }
}

pub fn add_machines(store: &StateStore, pool: &str, n: usize) {
    for i in 0..n {
        store.put_machine(&test_machine(pool, i)).unwrap();
    }
}

pub fn desired_count(store: &StateStore, pool: &str) -> i32 {
    store
        .get_cluster(CLUSTER_KEY)
        .unwrap()
        .unwrap()
        .pool(pool)
        .unwrap()
        .count
}

/// Counts calls before delegating to a real store.
pub struct CountingStore {
    inner: StateStore,
    gets: AtomicU32,
    updates: AtomicU32,
}

impl CountingStore {
    pub fn new(inner: StateStore) -> Self {
        Self {
            inner,
            gets: AtomicU32::new(0),
            updates: AtomicU32::new(0),
        }
    }

    pub fn gets(&self) -> u32 {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }
}

impl ClusterSpecStore for CountingStore {
    fn get(&self, key: &str) -> StateResult<Option<ClusterSpec>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_cluster(key)
    }

    fn update(&self, spec: &ClusterSpec) -> StateResult<ResourceVersion> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_cluster(spec)
    }
}

/// Lets a competing writer commit just before each of our first `races`
/// updates, so those updates hit a version conflict.
pub struct RacingStore {
    inner: StateStore,
    races: AtomicU32,
    updates: AtomicU32,
    competitor: Mutex<Box<dyn FnMut(&mut ClusterSpec) + Send>>,
}

impl RacingStore {
    pub fn new(
        inner: StateStore,
        races: u32,
        competitor: impl FnMut(&mut ClusterSpec) + Send + 'static,
    ) -> Self {
        Self {
            inner,
            races: AtomicU32::new(races),
            updates: AtomicU32::new(0),
            competitor: Mutex::new(Box::new(competitor)),
        }
    }

    pub fn updates(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }
}

impl ClusterSpecStore for RacingStore {
    fn get(&self, key: &str) -> StateResult<Option<ClusterSpec>> {
        self.inner.get_cluster(key)
    }

    fn update(&self, spec: &ClusterSpec) -> StateResult<ResourceVersion> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let race = self
            .races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if race {
            let mut current = self
                .inner
                .get_cluster(&spec.table_key())?
                .ok_or_else(|| StateError::NotFound(spec.table_key()))?;
            let mut guard = self.competitor.lock().unwrap();
            let competitor = &mut *guard;
            competitor(&mut current);
            drop(guard);
            self.inner.put_cluster(&current)?;
        }
        self.inner.update_cluster(spec)
    }
}
