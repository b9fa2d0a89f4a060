//! promoter-core: shared vocabulary for the promoter workspace.
//!
//! Holds the approval-decision and rollout-outcome types, the change
//! descriptor parser, the `promoter.toml` configuration, and the two
//! collaborator traits every other crate talks through: [`Notifier`]
//! and [`DedupGate`].

pub mod config;
pub mod dedup;
pub mod descriptor;
pub mod duration;
pub mod notify;
pub mod segment;
pub mod types;

pub use config::{ConfigError, ImageNamingConfig, PromoterConfig};
pub use dedup::{DedupError, DedupGate};
pub use descriptor::parse_descriptor;
pub use duration::parse_duration;
pub use notify::{LogNotifier, Notification, Notifier, RecordingNotifier, Severity};
pub use segment::SegmentPattern;
pub use types::*;
