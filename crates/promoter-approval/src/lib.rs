//! promoter-approval: where approval decisions come from.
//!
//! The pipeline only sees the [`ApprovalSource`] trait: list the decision
//! ids in a time window, then fetch one decision's detail. [`FeishuClient`]
//! implements it over the Feishu approval v4 API, decoding the embedded
//! form into a typed [`ApprovalDecision`](promoter_core::ApprovalDecision)
//! once, at this boundary. [`InMemoryApprovals`] serves fixed decisions.

pub mod error;
pub mod feishu;
pub mod memory;
pub mod source;

pub use error::ApprovalError;
pub use feishu::FeishuClient;
pub use memory::InMemoryApprovals;
pub use source::{ApprovalSource, DecisionRef, TimeRange};
