//! Pool registry: the autoscalable pools declared in the cluster spec.
//!
//! The registry holds an immutable [`PoolSnapshot`] behind a read-mostly
//! lock. `refresh()` builds a complete replacement outside the lock and
//! swaps it in, so readers see either the old list or the new one, never a
//! partial one. A failed refresh leaves the previous snapshot in place.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use poolgrid_state::{ResourceVersion, StateError};

use crate::cluster::ClusterSpecStore;
use crate::error::{ScaleError, ScaleResult};
use crate::pool::Pool;
use crate::reconciler::SizeReconciler;

/// One consistent view of the autoscalable pools.
#[derive(Debug, Default)]
pub struct PoolSnapshot {
    /// Bumped on every rebuild; 0 until the first successful refresh.
    pub generation: u64,
    /// `resource_version` of the cluster spec the pools were first built from.
    pub source_version: ResourceVersion,
    pub pools: Vec<Pool>,
}

/// What a refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { generation: u64, pools: usize },
    /// The pools (names and bounds) match the current snapshot.
    UpToDate,
}

pub struct PoolRegistry {
    cluster_key: String,
    specs: Arc<dyn ClusterSpecStore>,
    reconciler: Arc<dyn SizeReconciler>,
    snapshot: RwLock<Arc<PoolSnapshot>>,
}

impl PoolRegistry {
    pub fn new(
        cluster_key: impl Into<String>,
        specs: Arc<dyn ClusterSpecStore>,
        reconciler: Arc<dyn SizeReconciler>,
    ) -> Self {
        Self {
            cluster_key: cluster_key.into(),
            specs,
            reconciler,
            snapshot: RwLock::new(Arc::new(PoolSnapshot::default())),
        }
    }

    /// Re-read the cluster spec and rebuild the pool list.
    pub fn refresh(&self) -> ScaleResult<RefreshOutcome> {
        let spec = self
            .specs
            .get(&self.cluster_key)
            .and_then(|spec| spec.ok_or_else(|| StateError::NotFound(self.cluster_key.clone())))
            .map_err(|source| ScaleError::Lookup {
                cluster: self.cluster_key.clone(),
                source,
            })?;

        let pools: Vec<Pool> = spec
            .autoscaled_pools()
            .map(|(pool, opts)| {
                Pool::new(
                    pool.name.clone(),
                    opts.min_size,
                    opts.max_size,
                    self.reconciler.clone(),
                )
            })
            .collect();

        let mut current = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Versions restart when a cluster is deleted and re-created, so
        // compare what the pools look like instead.
        if current.generation > 0 && current.pools == pools {
            debug!(
                cluster = %self.cluster_key,
                version = spec.resource_version,
                "pool registry already up to date"
            );
            return Ok(RefreshOutcome::UpToDate);
        }

        let generation = current.generation + 1;
        let count = pools.len();
        *current = Arc::new(PoolSnapshot {
            generation,
            source_version: spec.resource_version,
            pools,
        });
        info!(
            cluster = %self.cluster_key,
            generation,
            version = spec.resource_version,
            pools = count,
            "pool registry refreshed"
        );
        Ok(RefreshOutcome::Updated {
            generation,
            pools: count,
        })
    }

    /// The current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<PoolSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Currently known pools.
    pub fn list(&self) -> Vec<Pool> {
        self.snapshot().pools.clone()
    }

    pub fn get(&self, name: &str) -> Option<Pool> {
        self.snapshot().pools.iter().find(|p| p.id() == name).cloned()
    }
}
