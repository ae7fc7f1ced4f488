//! Provider façade: the surface the generic autoscaler plugs into.
//!
//! Wires the reconciler, registry, inventory, and event sinks together for
//! one cluster, and answers the provider-level questions (name, GPU
//! metadata, which pool a machine belongs to).

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use poolgrid_core::PoolgridConfig;
use poolgrid_core::constants::PROVIDER_NAME;
use poolgrid_state::{Machine, StateStore};

use crate::cluster::ClusterSpecStore;
use crate::error::{ScaleError, ScaleResult};
use crate::events::{EventSink, FanoutEventSink, TracingEventSink};
use crate::inventory::MachineInventory;
use crate::pool::Pool;
use crate::reconciler::TargetSizeReconciler;
use crate::registry::{PoolRegistry, RefreshOutcome};

pub struct NodePoolProvider {
    registry: PoolRegistry,
    inventory: Arc<dyn MachineInventory>,
    gpu_label: String,
    gpu_types: BTreeSet<String>,
}

impl NodePoolProvider {
    /// Build a provider backed entirely by one state store. Audit events
    /// are both logged and persisted in the store.
    pub fn from_store(config: &PoolgridConfig, store: StateStore) -> Self {
        let events = FanoutEventSink::new()
            .with(Arc::new(TracingEventSink))
            .with(Arc::new(store.clone()));
        Self::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(events),
        )
    }

    pub fn new(
        config: &PoolgridConfig,
        specs: Arc<dyn ClusterSpecStore>,
        inventory: Arc<dyn MachineInventory>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let cluster_key = config.cluster_key();
        let reconciler = Arc::new(TargetSizeReconciler::new(
            cluster_key.clone(),
            specs.clone(),
            inventory.clone(),
            events,
        ));
        Self {
            registry: PoolRegistry::new(cluster_key, specs, reconciler),
            inventory,
            gpu_label: config.gpu.label.clone(),
            gpu_types: config.gpu.types.iter().cloned().collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn gpu_label(&self) -> &str {
        &self.gpu_label
    }

    pub fn available_gpu_types(&self) -> &BTreeSet<String> {
        &self.gpu_types
    }

    pub fn refresh(&self) -> ScaleResult<RefreshOutcome> {
        self.registry.refresh()
    }

    pub fn pools(&self) -> Vec<Pool> {
        self.registry.list()
    }

    pub fn pool(&self, name: &str) -> Option<Pool> {
        self.registry.get(name)
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    /// Pool the machine belongs to. `None` for control-plane machines,
    /// unlabelled machines, and labels naming a pool that is not autoscaled.
    pub fn pool_for_machine(&self, machine: &Machine) -> Option<Pool> {
        if machine.is_control_plane() {
            debug!(machine = %machine.name, "control-plane machine has no pool");
            return None;
        }
        let pool = machine.pool_label()?;
        self.registry.get(pool)
    }

    /// Like [`pool_for_machine`](Self::pool_for_machine), looked up by stable id.
    pub fn pool_for_machine_id(&self, machine_id: &str) -> ScaleResult<Option<Pool>> {
        let machine = self
            .inventory
            .find(machine_id)
            .map_err(ScaleError::Inventory)?
            .ok_or_else(|| ScaleError::MachineNotFound(machine_id.to_string()))?;
        Ok(self.pool_for_machine(&machine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    use poolgrid_core::constants::{CONTROL_PLANE_LABEL, NODE_POOL_LABEL};
    use poolgrid_state::EventReason;

    fn provider(store: &StateStore) -> NodePoolProvider {
        let config = PoolgridConfig::for_cluster("kommander", "prod");
        let provider = NodePoolProvider::from_store(&config, store.clone());
        provider.refresh().unwrap();
        provider
    }

    #[test]
    fn metadata() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_cluster(&test_cluster(3, 1, 10)).unwrap();
        let p = provider(&store);

        assert_eq!(p.name(), "poolgrid");
        assert_eq!(p.gpu_label(), "poolgrid.io/gpu");
        assert!(p.available_gpu_types().contains("nvidia-tesla-v100"));
        assert_eq!(p.pools().len(), 2);
    }

    #[test]
    fn pool_for_machine_by_label() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_cluster(&test_cluster(3, 1, 10)).unwrap();
        let p = provider(&store);

        let worker = test_machine("workers", 0);
        assert_eq!(p.pool_for_machine(&worker).unwrap().id(), "workers");

        let mut master = test_machine("workers", 1);
        master
            .labels
            .insert(CONTROL_PLANE_LABEL.to_string(), String::new());
        assert!(p.pool_for_machine(&master).is_none());

        let mut unlabelled = test_machine("workers", 2);
        unlabelled.labels.remove(NODE_POOL_LABEL);
        assert!(p.pool_for_machine(&unlabelled).is_none());

        // "static" has no autoscaling bounds, so it is not a registry pool.
        assert!(p.pool_for_machine(&test_machine("static", 0)).is_none());
    }

    #[test]
    fn pool_for_machine_id_uses_inventory() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_cluster(&test_cluster(3, 1, 10)).unwrap();
        add_machines(&store, "gpu", 1);
        let p = provider(&store);

        assert_eq!(p.pool_for_machine_id("i-gpu-0").unwrap().unwrap().id(), "gpu");
        assert!(matches!(
            p.pool_for_machine_id("i-missing"),
            Err(ScaleError::MachineNotFound(_))
        ));
    }

    #[test]
    fn events_are_persisted_in_the_store() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_cluster(&test_cluster(3, 1, 10)).unwrap();
        let p = provider(&store);

        p.pool("workers").unwrap().increase_size(1).unwrap();
        let events = store.list_events(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, EventReason::ScaledUpGroup);
        assert_eq!(events[0].cluster, CLUSTER_KEY);
    }
}
