//! poolgrid-state — embedded state store for PoolGrid.
//!
//! Backed by [redb](https://docs.rs/redb), holds the declarative cluster
//! specifications, the machine inventory, and the audit event log.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Cluster specs are keyed by `{namespace}/{name}` and carry a
//! `resource_version`; `update_cluster` is a compare-and-swap on that
//! version, which is what makes concurrent writers safe without locks.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across threads and async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
