//! Shared fixtures for draw_core tests: a store with failure injection and a
//! prompt that records what it was asked.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{CouponEntry, PrizeRecord, Requirements},
    protocol::ReportFilter,
};

use crate::{
    memory::MemoryStore,
    operator::{ConfirmRequest, OperatorPrompt},
    store::{CouponStore, DrawStore, PrizeLogStore, RequirementsStore},
};

pub fn requirements(event_name: &str, main: u32, consolation: u32) -> Requirements {
    Requirements {
        event_name: event_name.to_string(),
        main_prize_count: main,
        consolation_prize_count: consolation,
        total_digits: 4,
        min_range: 1,
        max_range: 20,
    }
}

pub fn numbered_coupons(range: std::ops::RangeInclusive<i64>, width: usize) -> Vec<CouponEntry> {
    range
        .map(|value| CouponEntry::unstamped(format!("{value:0width$}")))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    GetRequirements,
    ListCoupons,
    ListEventNames,
    AppendPrizeRecord,
    StampCoupon,
}

/// Wraps a `MemoryStore`; fails one operation after a number of successful calls.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_at: Mutex<Option<(FailPoint, usize)>>,
    calls: Mutex<Vec<FailPoint>>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_at: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails `point` once `after` calls to it have succeeded.
    pub fn fail(&self, point: FailPoint, after: usize) {
        *self.fail_at.lock().expect("fail_at lock") = Some((point, after));
    }

    pub fn heal(&self) {
        *self.fail_at.lock().expect("fail_at lock") = None;
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        let mut calls = self.calls.lock().expect("calls lock");
        let seen = calls.iter().filter(|call| **call == point).count();
        if let Some((fail_point, after)) = *self.fail_at.lock().expect("fail_at lock") {
            if fail_point == point && seen >= after {
                return Err(anyhow!("injected {point:?} failure"));
            }
        }
        calls.push(point);
        Ok(())
    }
}

#[async_trait]
impl RequirementsStore for FlakyStore {
    async fn get_requirements(&self) -> Result<Option<Requirements>> {
        self.check(FailPoint::GetRequirements)?;
        self.inner.get_requirements().await
    }

    async fn save_requirements(&self, requirements: &Requirements) -> Result<()> {
        self.inner.save_requirements(requirements).await
    }
}

#[async_trait]
impl CouponStore for FlakyStore {
    async fn list_coupons(&self) -> Result<Vec<CouponEntry>> {
        self.check(FailPoint::ListCoupons)?;
        self.inner.list_coupons().await
    }

    async fn replace_coupons(&self, numbers: &[String]) -> Result<()> {
        self.inner.replace_coupons(numbers).await
    }

    async fn stamp_coupon(&self, coupon_number: &str, rank: i64) -> Result<u64> {
        self.check(FailPoint::StampCoupon)?;
        self.inner.stamp_coupon(coupon_number, rank).await
    }

    async fn has_prize_stamps(&self) -> Result<bool> {
        self.inner.has_prize_stamps().await
    }

    async fn clear_prize_stamps(&self) -> Result<u64> {
        self.inner.clear_prize_stamps().await
    }
}

#[async_trait]
impl PrizeLogStore for FlakyStore {
    async fn list_event_names(&self) -> Result<Vec<String>> {
        self.check(FailPoint::ListEventNames)?;
        self.inner.list_event_names().await
    }

    async fn clear_event_records(&self, event_name: &str) -> Result<u64> {
        self.inner.clear_event_records(event_name).await
    }

    async fn append_prize_record(&self, record: &PrizeRecord) -> Result<()> {
        self.check(FailPoint::AppendPrizeRecord)?;
        self.inner.append_prize_record(record).await
    }

    async fn list_prize_records(&self, filter: &ReportFilter) -> Result<Vec<PrizeRecord>> {
        self.inner.list_prize_records(filter).await
    }
}

impl DrawStore for FlakyStore {}

/// Answers with a fixed value and counts the questions asked.
pub struct CountingPrompt {
    answer: bool,
    asked: Mutex<Vec<ConfirmRequest>>,
    count: AtomicUsize,
}

impl CountingPrompt {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn asked(&self) -> Vec<ConfirmRequest> {
        self.asked.lock().expect("asked lock").clone()
    }
}

impl OperatorPrompt for CountingPrompt {
    fn confirm(&self, request: ConfirmRequest) -> bool {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.asked.lock().expect("asked lock").push(request);
        self.answer
    }
}
