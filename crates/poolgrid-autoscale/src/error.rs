//! Autoscaler error types.

use thiserror::Error;

use poolgrid_state::StateError;

/// Errors returned by pool registry, reconciler, and pool handle operations.
#[derive(Debug, Error)]
pub enum ScaleError {
    /// The cluster spec could not be read.
    #[error("failed to read cluster spec {cluster}: {source}")]
    Lookup {
        cluster: String,
        #[source]
        source: StateError,
    },

    #[error("node pool {0} does not exist")]
    PoolNotFound(String),

    #[error("node pool {0} has no autoscaling bounds")]
    NotAutoscaled(String),

    #[error("machine {0} does not exist")]
    MachineNotFound(String),

    #[error("size increase too large for pool {pool}, desired: {desired} max: {max}")]
    Bounds { pool: String, desired: i32, max: i32 },

    #[error("min size reached for pool {pool}, size: {size} min: {min}")]
    MinSizeReached { pool: String, size: i32, min: i32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "attempt to delete existing machines in pool {pool}, target size: {target} delta: {delta} existing machines: {existing}"
    )]
    InvariantViolation {
        pool: String,
        target: i32,
        delta: i32,
        existing: i32,
    },

    #[error("machine {machine} is not in pool {pool} (labelled {})", .actual.as_deref().unwrap_or("<none>"))]
    Membership {
        machine: String,
        pool: String,
        actual: Option<String>,
    },

    #[error("cluster {cluster} cannot be resized: {reason}")]
    ClusterUnavailable { cluster: String, reason: String },

    /// Someone else wrote the cluster spec between our read and our write.
    #[error("cluster spec changed concurrently: {0}")]
    Conflict(#[source] StateError),

    #[error("failed to write cluster spec {cluster}: {source}")]
    Write {
        cluster: String,
        #[source]
        source: StateError,
    },

    #[error("machine inventory error: {0}")]
    Inventory(#[source] StateError),

    #[error("failed to resize pool {pool} by {delta} after {attempts} attempts: {source}")]
    RetriesExhausted {
        pool: String,
        delta: i32,
        attempts: u32,
        #[source]
        source: Box<ScaleError>,
    },
}

impl ScaleError {
    /// Whether the target-size writer should re-read and try again.
    ///
    /// Only store-level failures qualify. Missing pools, unavailable
    /// clusters, and caller mistakes will not change within the retry window.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScaleError::Conflict(_) | ScaleError::Write { .. } => true,
            ScaleError::Lookup { source, .. } => !matches!(source, StateError::NotFound(_)),
            _ => false,
        }
    }
}

pub type ScaleResult<T> = Result<T, ScaleError>;
