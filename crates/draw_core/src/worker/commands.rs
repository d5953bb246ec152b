//! Storage commands queued from the session controller to the storage worker.

use anyhow::Result;
use shared::{
    domain::{CouponEntry, PrizeRecord, Requirements},
    protocol::ReportFilter,
};
use tokio::sync::oneshot;

use crate::store::{ApplyCommitError, CommitPlan, CommitReceipt};

pub type Reply<T> = oneshot::Sender<Result<T>>;

pub enum StoreCommand {
    GetRequirements {
        reply: Reply<Option<Requirements>>,
    },
    SaveRequirements {
        requirements: Requirements,
        reply: Reply<()>,
    },
    ListCoupons {
        reply: Reply<Vec<CouponEntry>>,
    },
    ReplaceCoupons {
        numbers: Vec<String>,
        reply: Reply<()>,
    },
    StampCoupon {
        coupon_number: String,
        rank: i64,
        reply: Reply<u64>,
    },
    HasPrizeStamps {
        reply: Reply<bool>,
    },
    ClearPrizeStamps {
        reply: Reply<u64>,
    },
    ListEventNames {
        reply: Reply<Vec<String>>,
    },
    ClearEventRecords {
        event_name: String,
        reply: Reply<u64>,
    },
    AppendPrizeRecord {
        record: PrizeRecord,
        reply: Reply<()>,
    },
    ListPrizeRecords {
        filter: ReportFilter,
        reply: Reply<Vec<PrizeRecord>>,
    },
    ApplyCommit {
        plan: CommitPlan,
        reply: oneshot::Sender<Result<CommitReceipt, ApplyCommitError>>,
    },
}

impl StoreCommand {
    pub fn name(&self) -> &'static str {
        match self {
            StoreCommand::GetRequirements { .. } => "get_requirements",
            StoreCommand::SaveRequirements { .. } => "save_requirements",
            StoreCommand::ListCoupons { .. } => "list_coupons",
            StoreCommand::ReplaceCoupons { .. } => "replace_coupons",
            StoreCommand::StampCoupon { .. } => "stamp_coupon",
            StoreCommand::HasPrizeStamps { .. } => "has_prize_stamps",
            StoreCommand::ClearPrizeStamps { .. } => "clear_prize_stamps",
            StoreCommand::ListEventNames { .. } => "list_event_names",
            StoreCommand::ClearEventRecords { .. } => "clear_event_records",
            StoreCommand::AppendPrizeRecord { .. } => "append_prize_record",
            StoreCommand::ListPrizeRecords { .. } => "list_prize_records",
            StoreCommand::ApplyCommit { .. } => "apply_commit",
        }
    }
}
