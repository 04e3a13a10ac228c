//! stratus-state — embedded state store for cluster resources.
//!
//! Backed by [redb](https://docs.rs/redb). Each managed cluster has one
//! record keyed by its resource id, holding the persisted api model
//! document and a revision counter.
//!
//! # Concurrency
//!
//! Writers that loaded a record and want to replace it use
//! [`StateStore::replace_cluster_if_revision`], which compares the
//! revision inside a single write transaction. A concurrent writer that
//! committed first turns the second write into [`StateError::Conflict`].
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
