//! redb table definitions for the dedup store.

use redb::TableDefinition;

/// Dedup records keyed by approval decision id.
pub const PROCESSED: TableDefinition<&str, &[u8]> = TableDefinition::new("processed");
