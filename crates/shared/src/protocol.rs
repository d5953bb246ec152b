use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{PrizeRecord, PrizeTier, UserId};

/// Filter for the prize report. Date bounds are inclusive and compared on the run date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilter {
    pub event_name: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportFilter {
    pub fn for_event(event_name: impl Into<String>) -> Self {
        Self {
            event_name: Some(event_name.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &PrizeRecord) -> bool {
        if let Some(event_name) = &self.event_name {
            if &record.event_name != event_name {
                return false;
            }
        }
        let run_date = record.run_at.date_naive();
        if self.from.is_some_and(|from| run_date < from) {
            return false;
        }
        if self.to.is_some_and(|to| run_date > to) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub user_name: String,
}

/// One slot played back on the draw screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedSlot {
    pub tier: PrizeTier,
    pub position: usize,
    pub label: String,
    pub coupon_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub event_name: String,
    pub superseded_previous: bool,
    pub prize_records: usize,
    pub stamped_coupons: usize,
    pub committed_at: DateTime<Utc>,
}
