//! promoter-state: the persistent dedup store.
//!
//! Backed by [redb](https://docs.rs/redb). Each handled approval decision
//! gets one JSON-serialized [`DedupRecord`](promoter_core::DedupRecord)
//! keyed by decision id. The store is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and implements [`promoter_core::DedupGate`].

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::{DedupSnapshot, DedupStore};
