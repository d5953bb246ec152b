//! Result Committer: reconciles a finished draw into the prize log and coupon table.

use chrono::{DateTime, Utc};
use shared::{
    domain::{pad_coupon, CouponEntry, DrawResult, PrizeRecord, PrizeTier, Requirements, UserId},
    error::DrawError,
    protocol::CommitOutcome,
};
use tracing::{error, info};

use crate::store::{ApplyCommitError, CommitPlan, CouponStamp, DrawStore};

/// Stored numbers that pad to `number`. Coupons keep the width in force when
/// they were imported, which may differ from the current `total_digits`.
fn stored_numbers(inventory: &[CouponEntry], number: &str, width: usize) -> Vec<String> {
    let mut matches: Vec<String> = Vec::new();
    for entry in inventory {
        if pad_coupon(&entry.coupon_number, width) == number
            && !matches.contains(&entry.coupon_number)
        {
            matches.push(entry.coupon_number.clone());
        }
    }
    if matches.is_empty() {
        // Stamped as-is so the missing coupon is reported by the store.
        matches.push(number.to_string());
    }
    matches
}

pub fn build_commit_plan(
    result: &DrawResult,
    requirements: &Requirements,
    inventory: &[CouponEntry],
    operator: &UserId,
    supersede: bool,
    run_at: DateTime<Utc>,
) -> CommitPlan {
    let record = |tier: PrizeTier, position: usize, number: &str| PrizeRecord {
        event_name: requirements.event_name.clone(),
        prize_type_label: tier.label(position),
        coupon_number: number.to_string(),
        run_user_id: operator.clone(),
        run_at,
    };

    let mut records = Vec::with_capacity(result.len());
    let mut stamps = Vec::with_capacity(result.len());
    let width = requirements.width();
    let mut stamp = |number: &str, rank: i64| {
        for coupon_number in stored_numbers(inventory, number, width) {
            stamps.push(CouponStamp { coupon_number, rank });
        }
    };
    for (index, number) in result.main_prize_numbers.iter().enumerate() {
        records.push(record(PrizeTier::Main, index + 1, number));
        stamp(number, index as i64 + 1);
    }
    for (index, number) in result.consolation_prize_numbers.iter().enumerate() {
        records.push(record(PrizeTier::Consolation, index + 1, number));
        // Flat rank: the prize log keeps the per-number label.
        stamp(number, requirements.consolation_rank());
    }

    CommitPlan {
        event_name: requirements.event_name.clone(),
        supersede,
        records,
        stamps,
    }
}

fn ensure_result_matches(result: &DrawResult, requirements: &Requirements) -> Result<(), DrawError> {
    let main = requirements.main_prize_count as usize;
    let consolation = requirements.consolation_prize_count as usize;
    if result.main_prize_numbers.len() == main
        && result.consolation_prize_numbers.len() == consolation
    {
        return Ok(());
    }
    Err(DrawError::InvalidRequirements(vec![format!(
        "draw result holds {} main and {} consolation numbers but requirements ask for {main} and {consolation}",
        result.main_prize_numbers.len(),
        result.consolation_prize_numbers.len(),
    )]))
}

/// Commits `result` for `requirements.event_name`, superseding earlier rows for that event.
pub async fn commit<S>(
    store: &S,
    result: &DrawResult,
    requirements: &Requirements,
    operator: &UserId,
) -> Result<CommitOutcome, DrawError>
where
    S: DrawStore + ?Sized,
{
    ensure_result_matches(result, requirements)?;

    let recorded_events = store.list_event_names().await?;
    let supersede = recorded_events
        .iter()
        .any(|name| name == &requirements.event_name);

    let inventory = store.list_coupons().await?;
    let committed_at = Utc::now();
    let plan = build_commit_plan(
        result,
        requirements,
        &inventory,
        operator,
        supersede,
        committed_at,
    );

    match store.apply_commit(&plan).await {
        Ok(receipt) => {
            info!(
                event_name = %plan.event_name,
                superseded = supersede,
                cleared = receipt.cleared_records,
                logged = receipt.logged,
                stamped = receipt.stamped,
                "committed draw results"
            );
            Ok(CommitOutcome {
                event_name: plan.event_name,
                superseded_previous: supersede,
                prize_records: receipt.logged,
                stamped_coupons: receipt.stamped,
                committed_at,
            })
        }
        Err(ApplyCommitError::Aborted(source)) => {
            error!(event_name = %plan.event_name, "commit aborted: {source:#}");
            Err(DrawError::Storage(format!("{source:#}")))
        }
        Err(ApplyCommitError::Diverged {
            logged,
            stamped,
            source,
        }) => {
            error!(
                event_name = %plan.event_name,
                logged,
                stamped,
                "prize log and coupon stamps diverged: {source:#}"
            );
            Err(DrawError::CommitDiverged {
                logged,
                stamped,
                message: format!("{source:#}"),
            })
        }
    }
}

#[cfg(test)]
#[path = "tests/committer_tests.rs"]
mod tests;
