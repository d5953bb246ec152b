//! Storage seams consumed by the draw core.
//!
//! `crates/storage` implements these over SQLite; the storage worker implements
//! them again as a queue in front of any other implementation.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{CouponEntry, PrizeRecord, Requirements},
    protocol::ReportFilter,
};
use thiserror::Error;
use tracing::warn;

#[async_trait]
pub trait RequirementsStore: Send + Sync {
    async fn get_requirements(&self) -> Result<Option<Requirements>>;
    /// Full overwrite of the single requirements row.
    async fn save_requirements(&self, requirements: &Requirements) -> Result<()>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn list_coupons(&self) -> Result<Vec<CouponEntry>>;
    /// Clears the inventory and inserts `numbers` unstamped.
    async fn replace_coupons(&self, numbers: &[String]) -> Result<()>;
    /// Returns the number of coupon rows updated.
    async fn stamp_coupon(&self, coupon_number: &str, rank: i64) -> Result<u64>;
    async fn has_prize_stamps(&self) -> Result<bool>;
    async fn clear_prize_stamps(&self) -> Result<u64>;
}

#[async_trait]
pub trait PrizeLogStore: Send + Sync {
    async fn list_event_names(&self) -> Result<Vec<String>>;
    async fn clear_event_records(&self, event_name: &str) -> Result<u64>;
    async fn append_prize_record(&self, record: &PrizeRecord) -> Result<()>;
    async fn list_prize_records(&self, filter: &ReportFilter) -> Result<Vec<PrizeRecord>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponStamp {
    pub coupon_number: String,
    pub rank: i64,
}

/// Everything one commit writes: supersede, prize log rows, coupon stamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPlan {
    pub event_name: String,
    pub supersede: bool,
    pub records: Vec<PrizeRecord>,
    pub stamps: Vec<CouponStamp>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub cleared_records: u64,
    pub logged: usize,
    pub stamped: usize,
}

#[derive(Debug, Error)]
pub enum ApplyCommitError {
    /// Nothing from the plan reached the coupon table.
    #[error("commit aborted: {0:#}")]
    Aborted(anyhow::Error),
    /// The prize log was written but coupon stamping stopped partway.
    #[error("commit diverged after {logged} records and {stamped} stamps: {source:#}")]
    Diverged {
        logged: usize,
        stamped: usize,
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for ApplyCommitError {
    fn from(value: anyhow::Error) -> Self {
        ApplyCommitError::Aborted(value)
    }
}

#[async_trait]
pub trait DrawStore: RequirementsStore + CouponStore + PrizeLogStore {
    /// Applies a commit plan.
    ///
    /// The default runs without a transaction: the prize log is written in full
    /// before the first coupon is stamped, and a failure while stamping is
    /// reported as `Diverged`. Transactional stores override this.
    async fn apply_commit(&self, plan: &CommitPlan) -> Result<CommitReceipt, ApplyCommitError> {
        let mut receipt = CommitReceipt::default();
        if plan.supersede {
            receipt.cleared_records = self.clear_event_records(&plan.event_name).await?;
        }
        for record in &plan.records {
            self.append_prize_record(record).await?;
            receipt.logged += 1;
        }

        for stamp in &plan.stamps {
            let updated = match self.stamp_coupon(&stamp.coupon_number, stamp.rank).await {
                Ok(updated) => updated,
                Err(source) => {
                    return Err(ApplyCommitError::Diverged {
                        logged: receipt.logged,
                        stamped: receipt.stamped,
                        source,
                    })
                }
            };
            if updated == 0 {
                warn!(coupon = %stamp.coupon_number, "winning number missing from coupon inventory");
                return Err(ApplyCommitError::Diverged {
                    logged: receipt.logged,
                    stamped: receipt.stamped,
                    source: anyhow!(
                        "coupon {} is not present in the inventory",
                        stamp.coupon_number
                    ),
                });
            }
            receipt.stamped += 1;
        }
        Ok(receipt)
    }
}
