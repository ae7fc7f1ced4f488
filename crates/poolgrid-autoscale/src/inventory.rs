//! Machine inventory queries.
//!
//! The inventory is the live view of the fleet: which machines exist, which
//! pool label each carries, and whether removal has been requested. Machines
//! are addressed by their stable id (provider id, falling back to the local
//! name).

use poolgrid_core::constants::{DELETE_REQUESTED_ANNOTATION, NODE_POOL_LABEL};
use poolgrid_state::{Machine, StateResult, StateStore};

pub trait MachineInventory: Send + Sync {
    /// Machines whose label `key` equals `value`.
    fn list_with_label(&self, key: &str, value: &str) -> StateResult<Vec<Machine>>;

    /// The machine with the given stable id, if it exists.
    fn find(&self, stable_id: &str) -> StateResult<Option<Machine>>;

    /// Record a removal request. Teardown happens out of band.
    fn mark_for_deletion(&self, machine: &Machine, requested_at: &str) -> StateResult<()>;

    /// Machines currently labelled as members of `pool`.
    fn pool_members(&self, pool: &str) -> StateResult<Vec<Machine>> {
        self.list_with_label(NODE_POOL_LABEL, pool)
    }
}

impl MachineInventory for StateStore {
    fn list_with_label(&self, key: &str, value: &str) -> StateResult<Vec<Machine>> {
        self.list_machines_with_label(key, value)
    }

    fn find(&self, stable_id: &str) -> StateResult<Option<Machine>> {
        Ok(self
            .list_machines()?
            .into_iter()
            .find(|m| m.stable_id() == stable_id))
    }

    fn mark_for_deletion(&self, machine: &Machine, requested_at: &str) -> StateResult<()> {
        self.annotate_machine(&machine.name, DELETE_REQUESTED_ANNOTATION, requested_at)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn machine(name: &str, provider_id: Option<&str>, pool: Option<&str>) -> Machine {
        let mut labels = HashMap::new();
        if let Some(pool) = pool {
            labels.insert(NODE_POOL_LABEL.to_string(), pool.to_string());
        }
        Machine {
            name: name.to_string(),
            provider_id: provider_id.map(str::to_string),
            labels,
            annotations: HashMap::new(),
        }
    }

    #[test]
    fn pool_members_filters_by_label() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_machine(&machine("a", None, Some("workers"))).unwrap();
        store.put_machine(&machine("b", None, Some("gpu"))).unwrap();
        store.put_machine(&machine("c", None, None)).unwrap();

        let members = store.pool_members("workers").unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "a");
        assert!(store.pool_members("missing").unwrap().is_empty());
    }

    #[test]
    fn find_by_provider_id_or_name() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_machine(&machine("worker-0", Some("i-123"), Some("workers")))
            .unwrap();
        store.put_machine(&machine("worker-1", None, Some("workers"))).unwrap();

        assert_eq!(store.find("i-123").unwrap().unwrap().name, "worker-0");
        assert_eq!(store.find("worker-1").unwrap().unwrap().name, "worker-1");
        // A machine with a provider id is not addressable by its local name.
        assert!(store.find("worker-0").unwrap().is_none());
        assert!(store.find("i-999").unwrap().is_none());
    }

    #[test]
    fn mark_for_deletion_sets_annotation() {
        let store = StateStore::open_in_memory().unwrap();
        let m = machine("worker-0", Some("i-123"), Some("workers"));
        store.put_machine(&m).unwrap();

        store.mark_for_deletion(&m, "2026-10-18T00:00:00+00:00").unwrap();
        let stored = store.get_machine("worker-0").unwrap().unwrap();
        assert_eq!(stored.deletion_requested(), Some("2026-10-18T00:00:00+00:00"));
    }
}
