//! promoter-pipeline: turns approval decisions into rollouts.
//!
//! [`Processor`] runs one pass over the day's decisions: the dedup gate
//! first, then detail and expiry, then a branch on status. Approved
//! decisions roll out each descriptor item in order and wait for
//! convergence before the decision is marked done. [`Scheduler`] repeats
//! the pass on a fixed period until shutdown.
//!
//! ```text
//! list ─► exists? ─► fetch_detail ─► expired? ─► status
//!                                                 ├ Approved ─► apply ─► watch ─► mark
//!                                                 ├ Rejected ─► mark
//!                                                 └ Pending / Unknown ─► (nothing)
//! ```

pub mod error;
pub mod processor;
pub mod report;
pub mod scheduler;

pub use error::ProcessError;
pub use processor::{Cycle, Processor};
pub use report::{CycleReport, DecisionAction};
pub use scheduler::Scheduler;
