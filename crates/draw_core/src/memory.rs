//! In-process store. Holds a copy of a persisted store so a draw can be
//! rehearsed without writing anything back.

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{CouponEntry, PrizeRecord, Requirements},
    protocol::ReportFilter,
};
use tokio::sync::Mutex;

use crate::store::{CouponStore, DrawStore, PrizeLogStore, RequirementsStore};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    requirements: Option<Requirements>,
    coupons: Vec<CouponEntry>,
    prizes: Vec<PrizeRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(
        requirements: Option<Requirements>,
        coupons: Vec<CouponEntry>,
        prizes: Vec<PrizeRecord>,
    ) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                requirements,
                coupons,
                prizes,
            }),
        }
    }

    /// Copies requirements, coupons and prize log out of `source`.
    pub async fn snapshot_of<S>(source: &S) -> Result<Self>
    where
        S: DrawStore + ?Sized,
    {
        Ok(Self::with_contents(
            source.get_requirements().await?,
            source.list_coupons().await?,
            source.list_prize_records(&ReportFilter::default()).await?,
        ))
    }

    pub async fn coupons(&self) -> Vec<CouponEntry> {
        self.state.lock().await.coupons.clone()
    }
}

#[async_trait]
impl RequirementsStore for MemoryStore {
    async fn get_requirements(&self) -> Result<Option<Requirements>> {
        Ok(self.state.lock().await.requirements.clone())
    }

    async fn save_requirements(&self, requirements: &Requirements) -> Result<()> {
        self.state.lock().await.requirements = Some(requirements.clone());
        Ok(())
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn list_coupons(&self) -> Result<Vec<CouponEntry>> {
        Ok(self.state.lock().await.coupons.clone())
    }

    async fn replace_coupons(&self, numbers: &[String]) -> Result<()> {
        self.state.lock().await.coupons =
            numbers.iter().map(CouponEntry::unstamped).collect();
        Ok(())
    }

    async fn stamp_coupon(&self, coupon_number: &str, rank: i64) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut updated = 0;
        for entry in state
            .coupons
            .iter_mut()
            .filter(|entry| entry.coupon_number == coupon_number)
        {
            entry.prize_number = Some(rank);
            updated += 1;
        }
        Ok(updated)
    }

    async fn has_prize_stamps(&self) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .await
            .coupons
            .iter()
            .any(|entry| entry.prize_number.is_some()))
    }

    async fn clear_prize_stamps(&self) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut cleared = 0;
        for entry in state.coupons.iter_mut() {
            if entry.prize_number.take().is_some() {
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

#[async_trait]
impl PrizeLogStore for MemoryStore {
    async fn list_event_names(&self) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        let mut names: Vec<String> = Vec::new();
        for record in &state.prizes {
            if !names.contains(&record.event_name) {
                names.push(record.event_name.clone());
            }
        }
        Ok(names)
    }

    async fn clear_event_records(&self, event_name: &str) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.prizes.len();
        state.prizes.retain(|record| record.event_name != event_name);
        Ok((before - state.prizes.len()) as u64)
    }

    async fn append_prize_record(&self, record: &PrizeRecord) -> Result<()> {
        self.state.lock().await.prizes.push(record.clone());
        Ok(())
    }

    async fn list_prize_records(&self, filter: &ReportFilter) -> Result<Vec<PrizeRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .prizes
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}

impl DrawStore for MemoryStore {}
