//! Change descriptor parsing.
//!
//! A descriptor is the free-text approval field listing one
//! `<workload> <version>` pair per line. Malformed lines are logged and
//! dropped; they never abort the rest of the descriptor.

use tracing::warn;

use crate::types::ChangeItem;

/// Parse a descriptor into change items, preserving line order.
pub fn parse_descriptor(descriptor: &str) -> Vec<ChangeItem> {
    let mut items = Vec::new();

    for (index, line) in descriptor.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(workload), Some(version), None) => {
                items.push(ChangeItem::new(workload, version));
            }
            _ => {
                warn!(line = index + 1, content = %line, "skipping malformed descriptor line");
            }
        }
    }

    items
}
