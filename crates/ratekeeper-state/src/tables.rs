//! redb table definitions.
//!
//! Values are JSON-serialized records in `&[u8]` columns.

use redb::TableDefinition;

/// Percent documents keyed by document id.
pub const PERCENT_DOCUMENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("percent_documents");

/// Cycle reports keyed by `{target}:{epoch_ms:020}`, so keys sort by time within a target.
pub const CYCLE_HISTORY: TableDefinition<&str, &[u8]> = TableDefinition::new("cycle_history");

/// History key for a cycle on `target` at `epoch_ms`.
pub fn history_key(target: &str, epoch_ms: u64) -> String {
    format!("{target}:{epoch_ms:020}")
}
