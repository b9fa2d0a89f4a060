//! The approval-service collaborator trait.

use chrono::{DateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use promoter_core::ApprovalDecision;

use crate::error::ApprovalError;

/// A decision listed by the service, before its detail is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRef {
    pub id: String,
}

/// Inclusive window of decision creation times, unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeRange {
    /// The calendar day containing `now`, in `now`'s timezone.
    pub fn day_of<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let midnight = now.date_naive().and_time(NaiveTime::MIN);
        let start_ms = now
            .timezone()
            .from_local_datetime(&midnight)
            .earliest()
            .map(|d| d.timestamp_millis())
            .unwrap_or_else(|| now.timestamp_millis());
        Self {
            start_ms,
            end_ms: start_ms + 86_400_000 - 1,
        }
    }

    /// Today in the local timezone.
    pub fn today() -> Self {
        Self::day_of(&chrono::Local::now())
    }
}

/// Request/response access to approval decisions.
#[async_trait::async_trait]
pub trait ApprovalSource: Send + Sync {
    /// Decisions in `range`, in the service's order.
    async fn list_decisions(&self, range: TimeRange) -> Result<Vec<DecisionRef>, ApprovalError>;

    /// Full detail of one decision.
    async fn fetch_detail(&self, id: &str) -> Result<ApprovalDecision, ApprovalError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn day_of_covers_whole_utc_day() {
        let now = Utc.with_ymd_and_hms(2024, 5, 17, 13, 45, 0).unwrap();
        let range = TimeRange::day_of(&now);
        let start = Utc.with_ymd_and_hms(2024, 5, 17, 0, 0, 0).unwrap();

        assert_eq!(range.start_ms, start.timestamp_millis());
        assert_eq!(range.end_ms - range.start_ms, 86_400_000 - 1);
        assert!(range.start_ms <= now.timestamp_millis() && now.timestamp_millis() <= range.end_ms);
    }

    #[test]
    fn day_of_respects_offset() {
        let shanghai = FixedOffset::east_opt(8 * 3600).unwrap();
        let now = shanghai.with_ymd_and_hms(2024, 5, 17, 1, 0, 0).unwrap();
        let range = TimeRange::day_of(&now);
        let start = shanghai.with_ymd_and_hms(2024, 5, 17, 0, 0, 0).unwrap();
        assert_eq!(range.start_ms, start.timestamp_millis());
    }
}
