//! promoterd: the promoter daemon.
//!
//! The library half holds the HTTP surface so it can be driven in tests;
//! wiring and the CLI live in the binary.

pub mod health;
