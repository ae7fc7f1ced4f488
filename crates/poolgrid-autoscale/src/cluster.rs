//! Access to the declarative cluster spec.

use poolgrid_state::{ClusterSpec, ResourceVersion, StateResult, StateStore};

/// Versioned, optimistically-concurrent storage of cluster specs.
///
/// `update` must reject a spec whose `resource_version` is no longer the
/// stored one with `StateError::Conflict`.
pub trait ClusterSpecStore: Send + Sync {
    fn get(&self, key: &str) -> StateResult<Option<ClusterSpec>>;

    fn update(&self, spec: &ClusterSpec) -> StateResult<ResourceVersion>;
}

impl ClusterSpecStore for StateStore {
    fn get(&self, key: &str) -> StateResult<Option<ClusterSpec>> {
        self.get_cluster(key)
    }

    fn update(&self, spec: &ClusterSpec) -> StateResult<ResourceVersion> {
        self.update_cluster(spec)
    }
}
