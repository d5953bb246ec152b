//! Draw Selector: rejection sampling over the zero-padded coupon pool.

use std::collections::HashSet;

use rand::Rng;
use shared::{
    domain::{pad_coupon, CouponEntry, DrawResult, Requirements},
    error::DrawError,
};
use tracing::debug;

/// Picks disjoint main and consolation numbers from `inventory`.
///
/// Every round draws a fresh uniform index; values already taken are rejected
/// and the round is retried. The pool must hold at least as many distinct
/// padded values as there are prizes, otherwise the loop could never finish,
/// so that case is rejected before sampling starts.
pub fn select_prize_numbers<R>(
    inventory: &[CouponEntry],
    requirements: &Requirements,
    rng: &mut R,
) -> Result<DrawResult, DrawError>
where
    R: Rng + ?Sized,
{
    let width = requirements.width();
    let pool: Vec<String> = inventory
        .iter()
        .map(|entry| pad_coupon(&entry.coupon_number, width))
        .collect();
    if pool.is_empty() {
        return Err(DrawError::InventoryEmpty);
    }

    let required = requirements.total_prizes();
    let distinct = pool.iter().collect::<HashSet<_>>().len();
    if distinct < required {
        return Err(DrawError::InventoryInsufficient {
            required,
            available: distinct,
        });
    }

    let mut taken = HashSet::with_capacity(required);
    let main_prize_numbers = draw_distinct(
        &pool,
        requirements.main_prize_count as usize,
        &mut taken,
        rng,
    );
    let consolation_prize_numbers = draw_distinct(
        &pool,
        requirements.consolation_prize_count as usize,
        &mut taken,
        rng,
    );

    debug!(
        pool = pool.len(),
        main = main_prize_numbers.len(),
        consolation = consolation_prize_numbers.len(),
        "selected prize numbers"
    );
    Ok(DrawResult {
        main_prize_numbers,
        consolation_prize_numbers,
    })
}

fn draw_distinct<'a, R>(
    pool: &'a [String],
    count: usize,
    taken: &mut HashSet<&'a str>,
    rng: &mut R,
) -> Vec<String>
where
    R: Rng + ?Sized,
{
    let mut picked = Vec::with_capacity(count);
    while picked.len() < count {
        let candidate = &pool[rng.gen_range(0..pool.len())];
        if taken.insert(candidate.as_str()) {
            picked.push(candidate.clone());
        }
    }
    picked
}

#[cfg(test)]
#[path = "tests/selector_tests.rs"]
mod tests;
