//! Target-size reconciler. Reads and resizes pools in the cluster spec.
//!
//! The cluster spec is shared with the provisioning engine, which rewrites
//! other fields (phase, status) at any time. Every mutation therefore goes
//! through one bounded-retry writer:
//!
//! ```text
//! for attempt in 1..=3:
//!     spec = fetch()                       // never reuse an old copy
//!     paused or provisioning?  -> ClusterUnavailable (no retry)
//!     pool missing?            -> PoolNotFound       (no retry)
//!     new = compute(pool)                  // bounds re-checked on fresh data
//!     update(spec @ version)   -> Conflict  => next attempt
//! RetriesExhausted { pool, delta, last error }
//! ```
//!
//! Size changes are expressed as deltas and re-applied to the freshly read
//! count on each attempt, so two concurrent `+1` calls end at `+2`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use poolgrid_core::constants::MAX_UPDATE_ATTEMPTS;
use poolgrid_state::{ClusterSpec, NodePool, StateError};

use crate::cluster::ClusterSpecStore;
use crate::error::{ScaleError, ScaleResult};
use crate::events::{EventSink, size_change_event};
use crate::inventory::MachineInventory;

/// Outcome of a successful size write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeChange {
    pub from: i32,
    pub to: i32,
}

impl SizeChange {
    pub fn delta(&self) -> i32 {
        self.to - self.from
    }
}

/// Per-pool size operations, as seen by a pool handle.
pub trait SizeReconciler: Send + Sync {
    /// Desired count currently recorded in the cluster spec.
    fn target_size(&self, pool: &str) -> ScaleResult<i32>;

    /// Number of machines currently labelled as members of the pool.
    fn observed_machine_count(&self, pool: &str) -> ScaleResult<i32>;

    /// Stable ids of the machines currently in the pool.
    fn machine_ids(&self, pool: &str) -> ScaleResult<Vec<String>>;

    /// Grow the desired count by `delta` (> 0) without exceeding the pool max.
    fn increase_size(&self, pool: &str, delta: i32) -> ScaleResult<SizeChange>;

    /// Shrink the desired count by `|delta|` (delta < 0). Only unfulfilled
    /// requests can be retracted: the result never drops below the number
    /// of live machines.
    fn decrease_target_size(&self, pool: &str, delta: i32) -> ScaleResult<SizeChange>;

    /// Mark one machine for deletion and lower the desired count by one.
    fn remove_machine(&self, pool: &str, machine_id: &str) -> ScaleResult<SizeChange>;
}

/// Reconciles pool sizes in one cluster spec against the live inventory.
pub struct TargetSizeReconciler {
    cluster_key: String,
    specs: Arc<dyn ClusterSpecStore>,
    inventory: Arc<dyn MachineInventory>,
    events: Arc<dyn EventSink>,
}

impl TargetSizeReconciler {
    pub fn new(
        cluster_key: impl Into<String>,
        specs: Arc<dyn ClusterSpecStore>,
        inventory: Arc<dyn MachineInventory>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            cluster_key: cluster_key.into(),
            specs,
            inventory,
            events,
        }
    }

    pub fn cluster_key(&self) -> &str {
        &self.cluster_key
    }

    fn fetch_spec(&self) -> ScaleResult<ClusterSpec> {
        match self.specs.get(&self.cluster_key) {
            Ok(Some(spec)) => Ok(spec),
            Ok(None) => Err(ScaleError::Lookup {
                cluster: self.cluster_key.clone(),
                source: StateError::NotFound(self.cluster_key.clone()),
            }),
            Err(source) => Err(ScaleError::Lookup {
                cluster: self.cluster_key.clone(),
                source,
            }),
        }
    }

    fn ensure_available(&self, spec: &ClusterSpec) -> ScaleResult<()> {
        match spec.unavailable_reason() {
            Some(reason) => Err(ScaleError::ClusterUnavailable {
                cluster: self.cluster_key.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Bounded-retry writer shared by every mutating operation.
    ///
    /// `compute` receives the freshly read pool and returns the new desired
    /// count, or an error that aborts the write without retrying.
    fn write_size<F>(&self, pool: &str, delta: i32, compute: F) -> ScaleResult<SizeChange>
    where
        F: Fn(&NodePool) -> ScaleResult<i32>,
    {
        let mut attempt = 1;
        loop {
            match self.try_write_size(pool, &compute) {
                Ok(change) => {
                    info!(
                        cluster = %self.cluster_key,
                        pool,
                        from = change.from,
                        to = change.to,
                        attempt,
                        "pool target size updated"
                    );
                    return Ok(change);
                }
                Err(e) if e.is_retryable() && attempt < MAX_UPDATE_ATTEMPTS => {
                    warn!(
                        cluster = %self.cluster_key,
                        pool,
                        delta,
                        attempt,
                        error = %e,
                        "pool size write failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(ScaleError::RetriesExhausted {
                        pool: pool.to_string(),
                        delta,
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_write_size<F>(&self, pool: &str, compute: &F) -> ScaleResult<SizeChange>
    where
        F: Fn(&NodePool) -> ScaleResult<i32>,
    {
        let mut spec = self.fetch_spec()?;
        self.ensure_available(&spec)?;

        let node_pool = spec
            .pool_mut(pool)
            .ok_or_else(|| ScaleError::PoolNotFound(pool.to_string()))?;
        let from = node_pool.count;
        let to = compute(&*node_pool)?;
        node_pool.count = to;

        self.specs.update(&spec).map_err(|e| {
            if e.is_conflict() {
                ScaleError::Conflict(e)
            } else {
                ScaleError::Write {
                    cluster: self.cluster_key.clone(),
                    source: e,
                }
            }
        })?;
        Ok(SizeChange { from, to })
    }

    /// Emit the one audit event owed for a mutation attempt.
    fn record(&self, pool: &str, delta: i32, result: &ScaleResult<SizeChange>) {
        let event = match result {
            Ok(change) => size_change_event(
                &self.cluster_key,
                pool,
                change.delta(),
                true,
                format!(
                    "Scaled pool {pool} from {} to {} machines",
                    change.from, change.to
                ),
            ),
            Err(e) => size_change_event(
                &self.cluster_key,
                pool,
                delta,
                false,
                format!("Failed to scale pool {pool} by {delta}: {e}"),
            ),
        };
        self.events.emit(event);
    }

    fn decrease(&self, pool: &str, delta: i32) -> ScaleResult<SizeChange> {
        // Live machines are counted once per call, not on every attempt.
        let existing = self.observed_machine_count(pool)?;
        self.write_size(pool, delta, |p| {
            let new_size = p.count + delta;
            if new_size < existing {
                return Err(ScaleError::InvariantViolation {
                    pool: pool.to_string(),
                    target: p.count,
                    delta,
                    existing,
                });
            }
            Ok(new_size)
        })
    }

    fn remove(&self, pool: &str, machine_id: &str) -> ScaleResult<SizeChange> {
        let machine = self
            .inventory
            .find(machine_id)
            .map_err(ScaleError::Inventory)?
            .ok_or_else(|| ScaleError::MachineNotFound(machine_id.to_string()))?;

        let actual = machine.pool_label();
        if actual != Some(pool) {
            return Err(ScaleError::Membership {
                machine: machine_id.to_string(),
                pool: pool.to_string(),
                actual: actual.map(str::to_string),
            });
        }

        // Refuse before touching the machine if the size write cannot succeed.
        let spec = self.fetch_spec()?;
        self.ensure_available(&spec)?;
        if spec.pool(pool).is_none() {
            return Err(ScaleError::PoolNotFound(pool.to_string()));
        }

        let requested_at = chrono::Utc::now().to_rfc3339();
        self.inventory
            .mark_for_deletion(&machine, &requested_at)
            .map_err(ScaleError::Inventory)?;
        debug!(pool, machine = machine_id, %requested_at, "machine marked for deletion");

        // From here on a failure leaves the machine marked while the pool
        // keeps its old count; the caller gets the error and retries.
        self.write_size(pool, -1, |p| {
            if p.count <= 0 {
                return Err(ScaleError::MinSizeReached {
                    pool: pool.to_string(),
                    size: p.count,
                    min: 0,
                });
            }
            Ok(p.count - 1)
        })
    }
}

impl SizeReconciler for TargetSizeReconciler {
    fn target_size(&self, pool: &str) -> ScaleResult<i32> {
        let spec = self.fetch_spec()?;
        let size = spec
            .pool(pool)
            .map(|p| p.count)
            .ok_or_else(|| ScaleError::PoolNotFound(pool.to_string()))?;
        debug!(pool, size, "target size");
        Ok(size)
    }

    fn observed_machine_count(&self, pool: &str) -> ScaleResult<i32> {
        let members = self
            .inventory
            .pool_members(pool)
            .map_err(ScaleError::Inventory)?;
        Ok(i32::try_from(members.len()).unwrap_or(i32::MAX))
    }

    fn machine_ids(&self, pool: &str) -> ScaleResult<Vec<String>> {
        let members = self
            .inventory
            .pool_members(pool)
            .map_err(ScaleError::Inventory)?;
        Ok(members.iter().map(|m| m.stable_id().to_string()).collect())
    }

    fn increase_size(&self, pool: &str, delta: i32) -> ScaleResult<SizeChange> {
        if delta <= 0 {
            return Err(ScaleError::InvalidArgument(format!(
                "size increase must be positive, got {delta}"
            )));
        }
        let result = self.write_size(pool, delta, |p| {
            let max = p
                .autoscaling
                .map(|opts| opts.max_size)
                .ok_or_else(|| ScaleError::NotAutoscaled(pool.to_string()))?;
            let new_size = p.count.saturating_add(delta);
            if new_size > max {
                return Err(ScaleError::Bounds {
                    pool: pool.to_string(),
                    desired: new_size,
                    max,
                });
            }
            Ok(new_size)
        });
        self.record(pool, delta, &result);
        result
    }

    fn decrease_target_size(&self, pool: &str, delta: i32) -> ScaleResult<SizeChange> {
        if delta >= 0 {
            return Err(ScaleError::InvalidArgument(format!(
                "size decrease must be negative, got {delta}"
            )));
        }
        let result = self.decrease(pool, delta);
        self.record(pool, delta, &result);
        result
    }

    fn remove_machine(&self, pool: &str, machine_id: &str) -> ScaleResult<SizeChange> {
        let result = self.remove(pool, machine_id);
        self.record(pool, -1, &result);
        result
    }
}
