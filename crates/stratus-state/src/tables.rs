//! redb table definitions for the Stratus state store.
//!
//! Tables use `&str` keys and `&[u8]` values (JSON-serialized records).

use redb::TableDefinition;

/// Cluster records keyed by cluster resource id.
pub const CLUSTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("clusters");
