//! Offline dedup maintenance. The daemon holds the store's file lock, so
//! these commands only run while it is stopped.

use promoter_core::PromoterConfig;
use promoter_state::{DedupSnapshot, DedupStore, StateError};

pub fn status(config: &PromoterConfig, id: &str) -> anyhow::Result<()> {
    let snapshot = DedupSnapshot::open(&config.state.path).map_err(offline)?;
    match snapshot.get(id)? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("{id} has not been processed"),
    }
    Ok(())
}

pub fn forget(config: &PromoterConfig, id: &str) -> anyhow::Result<()> {
    let store = DedupStore::open_existing(&config.state.path).map_err(offline)?;
    if store.forget(id)? {
        println!("✓ {id} forgotten; it will be processed when the daemon next runs");
    } else {
        println!("{id} was not recorded");
    }
    Ok(())
}

pub fn list(config: &PromoterConfig) -> anyhow::Result<()> {
    let snapshot = DedupSnapshot::open(&config.state.path).map_err(offline)?;
    let records = snapshot.list()?;
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn offline(e: StateError) -> anyhow::Error {
    match e {
        StateError::Locked(path) => {
            anyhow::anyhow!("{path} is held by a running daemon; stop promoterd before running dedup commands")
        }
        other => other.into(),
    }
}
