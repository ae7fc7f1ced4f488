//! poolgrid-autoscale — node-pool target-size reconciliation.
//!
//! Translates "scale this pool to N" into conflict-safe writes of the
//! `count` field of a pool in the declarative cluster spec, and answers
//! "how many machines does this pool have / want?" by cross-referencing
//! the spec with the live machine inventory.
//!
//! # Architecture
//!
//! ```text
//! NodePoolProvider
//!   ├── PoolRegistry ── refresh() → PoolSnapshot { Pool, Pool, ... }
//!   │                                 │
//!   │                                 └── Arc<dyn SizeReconciler>
//!   └── TargetSizeReconciler
//!         ├── ClusterSpecStore  (get / versioned update)
//!         ├── MachineInventory  (list by label, find, mark for deletion)
//!         └── EventSink         (one audit event per mutation)
//! ```
//!
//! # Invariants
//!
//! - `increase_size` never takes a pool above its `max_size`.
//! - `decrease_target_size` never takes the desired count below the number
//!   of live machines; it only retracts unfulfilled scale-ups.
//! - Writes carry the version they were computed from. A conflict re-reads
//!   and re-applies the delta (up to 3 attempts), so concurrent callers
//!   never lose each other's updates.
//! - A paused or provisioning cluster is never written to.

pub mod cluster;
pub mod error;
pub mod events;
pub mod inventory;
pub mod pool;
pub mod provider;
pub mod reconciler;
pub mod registry;

#[cfg(test)]
mod testing;

pub use cluster::ClusterSpecStore;
pub use error::{ScaleError, ScaleResult};
pub use events::{EventSink, FanoutEventSink, MemoryEventSink, TracingEventSink};
pub use inventory::MachineInventory;
pub use pool::Pool;
pub use provider::NodePoolProvider;
pub use reconciler::{SizeChange, SizeReconciler, TargetSizeReconciler};
pub use registry::{PoolRegistry, PoolSnapshot, RefreshOutcome};
