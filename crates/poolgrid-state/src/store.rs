//! StateStore — redb-backed state persistence for PoolGrid.
//!
//! Provides typed operations over cluster specs, machines, and audit
//! events. All values are JSON-serialized into redb's `&[u8]` value
//! columns. The store supports both on-disk and in-memory backends (the
//! latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
        txn.open_table(MACHINES).map_err(map_err!(Table))?;
        txn.open_table(EVENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Clusters ───────────────────────────────────────────────────

    /// Insert or overwrite a cluster spec regardless of its version.
    ///
    /// This is how the provisioning side seeds and rewrites the object.
    /// Returns the version assigned to the stored copy.
    pub fn put_cluster(&self, spec: &ClusterSpec) -> StateResult<ResourceVersion> {
        let key = spec.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let version;
        {
            let mut table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
            let stored = stored_version(&table, &key)?;
            version = stored.unwrap_or(0) + 1;
            let mut spec = spec.clone();
            spec.resource_version = version;
            let value = serde_json::to_vec(&spec).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, version, "cluster stored");
        Ok(version)
    }

    /// Write a cluster spec only if nobody changed it since it was read.
    ///
    /// `spec.resource_version` must equal the stored version, otherwise
    /// the write is rejected with [`StateError::Conflict`] and nothing
    /// changes. Returns the new version.
    pub fn update_cluster(&self, spec: &ClusterSpec) -> StateResult<ResourceVersion> {
        let key = spec.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let version;
        {
            let mut table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
            let stored = stored_version(&table, &key)?
                .ok_or_else(|| StateError::NotFound(key.clone()))?;
            if stored != spec.resource_version {
                // Dropping the transaction aborts it.
                return Err(StateError::Conflict {
                    key,
                    expected: spec.resource_version,
                    actual: stored,
                });
            }
            version = stored + 1;
            let mut spec = spec.clone();
            spec.resource_version = version;
            let value = serde_json::to_vec(&spec).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, version, "cluster updated");
        Ok(version)
    }

    /// Get a cluster spec by `{namespace}/{name}` key.
    pub fn get_cluster(&self, key: &str) -> StateResult<Option<ClusterSpec>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let spec: ClusterSpec =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(spec))
            }
            None => Ok(None),
        }
    }

    /// List all cluster specs.
    pub fn list_clusters(&self) -> StateResult<Vec<ClusterSpec>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let spec: ClusterSpec =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(spec);
        }
        Ok(results)
    }

    /// Delete a cluster spec by key. Returns true if it existed.
    pub fn delete_cluster(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "cluster deleted");
        Ok(existed)
    }

    // ── Machines ───────────────────────────────────────────────────

    /// Insert or update a machine.
    pub fn put_machine(&self, machine: &Machine) -> StateResult<()> {
        let value = serde_json::to_vec(machine).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(MACHINES).map_err(map_err!(Table))?;
            table
                .insert(machine.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a machine by its local name.
    pub fn get_machine(&self, name: &str) -> StateResult<Option<Machine>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MACHINES).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                let machine: Machine =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(machine))
            }
            None => Ok(None),
        }
    }

    /// List all machines.
    pub fn list_machines(&self) -> StateResult<Vec<Machine>> {
        self.scan_machines(|_| true)
    }

    /// List machines whose label `key` equals `value`.
    pub fn list_machines_with_label(&self, key: &str, value: &str) -> StateResult<Vec<Machine>> {
        self.scan_machines(|m| m.labels.get(key).is_some_and(|v| v == value))
    }

    fn scan_machines(&self, keep: impl Fn(&Machine) -> bool) -> StateResult<Vec<Machine>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MACHINES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let machine: Machine =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if keep(&machine) {
                results.push(machine);
            }
        }
        Ok(results)
    }

    /// Set one annotation on a machine, keeping everything else intact.
    pub fn annotate_machine(&self, name: &str, key: &str, value: &str) -> StateResult<Machine> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let machine;
        {
            let mut table = txn.open_table(MACHINES).map_err(map_err!(Table))?;
            let mut current: Machine = match table.get(name).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(name.to_string())),
            };
            current
                .annotations
                .insert(key.to_string(), value.to_string());
            let bytes = serde_json::to_vec(&current).map_err(map_err!(Serialize))?;
            table
                .insert(name, bytes.as_slice())
                .map_err(map_err!(Write))?;
            machine = current;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(machine = %name, annotation = %key, "machine annotated");
        Ok(machine)
    }

    /// Delete a machine by name. Returns true if it existed.
    pub fn delete_machine(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(MACHINES).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Events ─────────────────────────────────────────────────────

    /// Append an audit event. Returns its sequence number.
    pub fn append_event(&self, event: &AuditEvent) -> StateResult<u64> {
        let value = serde_json::to_vec(event).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let seq;
        {
            let mut table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
            let last = table
                .last()
                .map_err(map_err!(Read))?
                .map(|(key, _)| key.value());
            seq = last.map_or(1, |n| n + 1);
            table
                .insert(seq, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(seq)
    }

    /// The most recent `limit` events, oldest first.
    pub fn list_events(&self, limit: usize) -> StateResult<Vec<AuditEvent>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))?.rev() {
            if results.len() >= limit {
                break;
            }
            let (_, value) = entry.map_err(map_err!(Read))?;
            let event: AuditEvent =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(event);
        }
        results.reverse();
        Ok(results)
    }
}

/// Version of the stored cluster under `key`, if present.
fn stored_version(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StateResult<Option<ResourceVersion>> {
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let stored: ClusterSpec =
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(stored.resource_version))
        }
        None => Ok(None),
    }
}
