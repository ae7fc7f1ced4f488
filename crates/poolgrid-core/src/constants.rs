//! Well-known label and annotation keys shared by every PoolGrid crate.

/// Label carried by every machine that belongs to an autoscaled pool.
pub const NODE_POOL_LABEL: &str = "autoscaling.k8s.io/nodegroup";

/// Annotation written when a machine is selected for removal. The value is
/// an RFC 3339 timestamp; teardown is done by whatever watches this key.
pub const DELETE_REQUESTED_ANNOTATION: &str = "autoscaling.poolgrid.io/delete-requested-at";

/// Control-plane machines carry this label and are never part of a pool.
pub const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/master";

/// Provider name reported to the autoscaler.
pub const PROVIDER_NAME: &str = "poolgrid";

/// Default label used to advertise GPU machines.
pub const DEFAULT_GPU_LABEL: &str = "poolgrid.io/gpu";

/// Attempts made by the target-size writer before giving up.
pub const MAX_UPDATE_ATTEMPTS: u32 = 3;
