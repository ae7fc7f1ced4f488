//! Pool handles, the per-pool surface the autoscaler core calls.
//!
//! A `Pool` is value data (name and bounds captured at registry refresh)
//! plus a shared [`SizeReconciler`] capability. Calls that can be rejected
//! from the cached bounds alone fail here, before any store round trip.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::error::{ScaleError, ScaleResult};
use crate::reconciler::{SizeChange, SizeReconciler};

#[derive(Clone)]
pub struct Pool {
    name: String,
    min_size: i32,
    max_size: i32,
    reconciler: Arc<dyn SizeReconciler>,
}

impl Pool {
    pub fn new(
        name: impl Into<String>,
        min_size: i32,
        max_size: i32,
        reconciler: Arc<dyn SizeReconciler>,
    ) -> Self {
        Self {
            name: name.into(),
            min_size,
            max_size,
            reconciler,
        }
    }

    pub fn id(&self) -> &str {
        &self.name
    }

    pub fn min_size(&self) -> i32 {
        self.min_size
    }

    pub fn max_size(&self) -> i32 {
        self.max_size
    }

    /// `name (min:max)`.
    pub fn debug(&self) -> String {
        format!("{} ({}:{})", self.name, self.min_size, self.max_size)
    }

    /// Pools come from the cluster spec, so they always exist there.
    pub fn exists(&self) -> bool {
        true
    }

    pub fn autoprovisioned(&self) -> bool {
        false
    }

    /// Current target size. May differ from the number of live machines.
    pub fn target_size(&self) -> ScaleResult<i32> {
        self.reconciler.target_size(&self.name)
    }

    /// Number of machines currently in the pool.
    pub fn size(&self) -> ScaleResult<i32> {
        self.reconciler.observed_machine_count(&self.name)
    }

    /// Stable ids of the machines currently in the pool.
    pub fn machines(&self) -> ScaleResult<Vec<String>> {
        self.reconciler.machine_ids(&self.name)
    }

    pub fn increase_size(&self, delta: i32) -> ScaleResult<SizeChange> {
        info!(pool = %self.name, delta, "increase size");
        if delta <= 0 {
            return Err(ScaleError::InvalidArgument(format!(
                "size increase must be positive, got {delta}"
            )));
        }
        // Target size is never negative, so this can only overshoot.
        if delta > self.max_size {
            return Err(ScaleError::Bounds {
                pool: self.name.clone(),
                desired: delta,
                max: self.max_size,
            });
        }
        self.reconciler.increase_size(&self.name, delta)
    }

    /// Retract scale-up requests that have not been fulfilled yet.
    /// Never removes existing machines.
    pub fn decrease_target_size(&self, delta: i32) -> ScaleResult<SizeChange> {
        info!(pool = %self.name, delta, "decrease target size");
        if delta >= 0 {
            return Err(ScaleError::InvalidArgument(format!(
                "size decrease must be negative, got {delta}"
            )));
        }
        self.reconciler.decrease_target_size(&self.name, delta)
    }

    /// Remove the given machines, one at a time, stopping at the first error.
    /// Repeated ids are removed once.
    ///
    /// Refused up front when removing them all would take the pool below
    /// its minimum size.
    pub fn delete_machines(&self, machine_ids: &[String]) -> ScaleResult<()> {
        let mut seen = BTreeSet::new();
        let machine_ids: Vec<&String> = machine_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .collect();
        info!(pool = %self.name, machines = ?machine_ids, "delete machines");
        let size = self.reconciler.target_size(&self.name)?;
        let requested = i32::try_from(machine_ids.len()).unwrap_or(i32::MAX);
        if size <= self.min_size || size.saturating_sub(requested) < self.min_size {
            return Err(ScaleError::MinSizeReached {
                pool: self.name.clone(),
                size,
                min: self.min_size,
            });
        }
        for id in machine_ids {
            self.reconciler.remove_machine(&self.name, id)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

/// Identity comparison: same name and bounds.
impl PartialEq for Pool {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.min_size == other.min_size && self.max_size == other.max_size
    }
}

impl Eq for Pool {}
