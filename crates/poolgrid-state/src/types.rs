//! Domain types for the PoolGrid state store.
//!
//! These types represent the declarative cluster specification, the
//! machines observed in the fleet, and the audit trail of size changes.
//! All types are serializable to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use poolgrid_core::constants::{CONTROL_PLANE_LABEL, DELETE_REQUESTED_ANNOTATION, NODE_POOL_LABEL};

/// Optimistic-concurrency version assigned by the store.
pub type ResourceVersion = u64;

// ── Cluster ────────────────────────────────────────────────────────

/// Declarative cluster object shared with the provisioning engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterSpec {
    pub name: String,
    pub namespace: String,
    /// Version observed when this copy was read. Zero for objects that
    /// have never been stored.
    #[serde(default)]
    pub resource_version: ResourceVersion,
    #[serde(default)]
    pub provisioning_paused: bool,
    #[serde(default)]
    pub phase: ClusterPhase,
    #[serde(default)]
    pub node_pools: Vec<NodePool>,
}

/// Lifecycle phase reported by the provisioning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ClusterPhase {
    Pending,
    Provisioning,
    Provisioned,
    Deleting,
    DeleteFailed,
    Failed,
    Deleted,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A named group of machines scaled as a unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodePool {
    pub name: String,
    /// Desired machine count.
    pub count: i32,
    /// Present only for pools the autoscaler may resize.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<AutoscalingOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoscalingOptions {
    pub min_size: i32,
    pub max_size: i32,
}

impl ClusterSpec {
    /// Build the composite key for the clusters table.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn pool(&self, name: &str) -> Option<&NodePool> {
        self.node_pools.iter().find(|p| p.name == name)
    }

    pub fn pool_mut(&mut self, name: &str) -> Option<&mut NodePool> {
        self.node_pools.iter_mut().find(|p| p.name == name)
    }

    /// Pools carrying autoscaling bounds, in declaration order.
    pub fn autoscaled_pools(&self) -> impl Iterator<Item = (&NodePool, AutoscalingOptions)> {
        self.node_pools
            .iter()
            .filter_map(|p| p.autoscaling.map(|opts| (p, opts)))
    }

    /// Why size changes must not be written right now, if anything.
    pub fn unavailable_reason(&self) -> Option<&'static str> {
        if self.provisioning_paused {
            Some("provisioning is paused")
        } else if self.phase == ClusterPhase::Provisioning {
            Some("cluster is provisioning")
        } else {
            None
        }
    }
}

// ── Machine ───────────────────────────────────────────────────────

/// A worker machine as seen in the live fleet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Machine {
    /// Local (cluster-scoped) name.
    pub name: String,
    /// Cloud-assigned instance identifier, e.g. `aws:///us-west-2a/i-0abc`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl Machine {
    /// Provider id when set, local name otherwise.
    pub fn stable_id(&self) -> &str {
        match self.provider_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => &self.name,
        }
    }

    /// Pool this machine is labelled with.
    pub fn pool_label(&self) -> Option<&str> {
        self.labels.get(NODE_POOL_LABEL).map(String::as_str)
    }

    pub fn is_control_plane(&self) -> bool {
        self.labels.contains_key(CONTROL_PLANE_LABEL)
    }

    /// Timestamp of the pending deletion request, if any.
    pub fn deletion_requested(&self) -> Option<&str> {
        self.annotations
            .get(DELETE_REQUESTED_ANNOTATION)
            .map(String::as_str)
    }
}

// ── Audit events ──────────────────────────────────────────────────

/// Why an audit event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventReason {
    ScaledUpGroup,
    ScaleUpFailed,
    ScaledDownGroup,
    ScaleDownFailed,
}

impl EventReason {
    /// Pick the reason for a size change of `delta` that did or did not succeed.
    pub fn for_delta(delta: i32, success: bool) -> Self {
        match (delta > 0, success) {
            (true, true) => EventReason::ScaledUpGroup,
            (true, false) => EventReason::ScaleUpFailed,
            (false, true) => EventReason::ScaledDownGroup,
            (false, false) => EventReason::ScaleDownFailed,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            EventReason::ScaledUpGroup | EventReason::ScaledDownGroup => Severity::Normal,
            EventReason::ScaleUpFailed | EventReason::ScaleDownFailed => Severity::Warning,
        }
    }
}

impl std::fmt::Display for EventReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventReason::ScaledUpGroup => write!(f, "ScaledUpGroup"),
            EventReason::ScaleUpFailed => write!(f, "ScaleUpFailed"),
            EventReason::ScaledDownGroup => write!(f, "ScaledDownGroup"),
            EventReason::ScaleDownFailed => write!(f, "ScaleDownFailed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Warning,
}

/// Human-readable record of one size mutation attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub reason: EventReason,
    pub severity: Severity,
    /// `{namespace}/{name}` of the cluster the pool lives in.
    pub cluster: String,
    pub pool: String,
    /// Machine-count delta that was applied or attempted.
    pub delta: i32,
    pub message: String,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
}
