//! redb table definitions for the PoolGrid state store.
//!
//! Each table uses `&str` or `u64` keys and `&[u8]` values (JSON-serialized
//! domain types).

use redb::TableDefinition;

/// Cluster specs keyed by `{namespace}/{name}`.
pub const CLUSTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("clusters");

/// Machines keyed by their local name.
pub const MACHINES: TableDefinition<&str, &[u8]> = TableDefinition::new("machines");

/// Audit events keyed by a monotonically increasing sequence number.
pub const EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("events");
