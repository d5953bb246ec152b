//! Storage worker: a single task that owns the store and runs queued commands
//! one at a time, in arrival order.
//!
//! `WorkerHandle` implements the store traits by queueing commands, so the
//! session controller never touches the underlying store directly. Every
//! request is bounded by the configured timeout.

pub mod commands;

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{CouponEntry, PrizeRecord, Requirements},
    protocol::ReportFilter,
};
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::store::{
    ApplyCommitError, CommitPlan, CommitReceipt, CouponStore, DrawStore, PrizeLogStore,
    RequirementsStore,
};
use commands::{Reply, StoreCommand};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub queue_capacity: usize,
    pub request_timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub struct StorageWorker {
    store: Arc<dyn DrawStore>,
    commands: mpsc::Receiver<StoreCommand>,
}

impl StorageWorker {
    /// Spawns the worker on the current tokio runtime. It stops once every
    /// handle has been dropped.
    pub fn spawn(store: Arc<dyn DrawStore>, options: WorkerOptions) -> WorkerHandle {
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let worker = Self {
            store,
            commands: rx,
        };
        tokio::spawn(worker.run());
        WorkerHandle {
            commands: tx,
            timeout: options.request_timeout,
        }
    }

    async fn run(mut self) {
        info!("storage worker ready");
        while let Some(command) = self.commands.recv().await {
            self.execute(command).await;
        }
        info!("storage worker stopped");
    }

    async fn execute(&self, command: StoreCommand) {
        let name = command.name();
        debug!(command = name, "executing storage command");
        let store = self.store.as_ref();

        // A caller that timed out has dropped its receiver.
        let delivered = match command {
            StoreCommand::GetRequirements { reply } => {
                reply.send(store.get_requirements().await).is_ok()
            }
            StoreCommand::SaveRequirements {
                requirements,
                reply,
            } => reply
                .send(store.save_requirements(&requirements).await)
                .is_ok(),
            StoreCommand::ListCoupons { reply } => reply.send(store.list_coupons().await).is_ok(),
            StoreCommand::ReplaceCoupons { numbers, reply } => {
                reply.send(store.replace_coupons(&numbers).await).is_ok()
            }
            StoreCommand::StampCoupon {
                coupon_number,
                rank,
                reply,
            } => reply
                .send(store.stamp_coupon(&coupon_number, rank).await)
                .is_ok(),
            StoreCommand::HasPrizeStamps { reply } => {
                reply.send(store.has_prize_stamps().await).is_ok()
            }
            StoreCommand::ClearPrizeStamps { reply } => {
                reply.send(store.clear_prize_stamps().await).is_ok()
            }
            StoreCommand::ListEventNames { reply } => {
                reply.send(store.list_event_names().await).is_ok()
            }
            StoreCommand::ClearEventRecords { event_name, reply } => reply
                .send(store.clear_event_records(&event_name).await)
                .is_ok(),
            StoreCommand::AppendPrizeRecord { record, reply } => {
                reply.send(store.append_prize_record(&record).await).is_ok()
            }
            StoreCommand::ListPrizeRecords { filter, reply } => {
                reply.send(store.list_prize_records(&filter).await).is_ok()
            }
            StoreCommand::ApplyCommit { plan, reply } => {
                reply.send(store.apply_commit(&plan).await).is_ok()
            }
        };

        if !delivered {
            warn!(command = name, "caller stopped waiting for storage reply");
        }
    }
}

#[derive(Clone)]
pub struct WorkerHandle {
    commands: mpsc::Sender<StoreCommand>,
    timeout: Duration,
}

impl WorkerHandle {
    fn timeout_ms(&self) -> u128 {
        self.timeout.as_millis()
    }

    async fn enqueue(&self, command: StoreCommand) -> Result<()> {
        let name = command.name();
        match timeout(self.timeout, self.commands.send(command)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(anyhow!("storage worker unavailable; {name} was not queued")),
            Err(_) => Err(anyhow!(
                "storage worker queue stayed full for {} ms; {name} was not queued",
                self.timeout_ms()
            )),
        }
    }

    async fn request<T, F>(&self, build: F) -> Result<T>
    where
        T: Send,
        F: FnOnce(Reply<T>) -> StoreCommand + Send,
    {
        let (reply, response) = oneshot::channel();
        let command = build(reply);
        let name = command.name();
        self.enqueue(command).await?;

        match timeout(self.timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(anyhow!("storage worker dropped the {name} request")),
            Err(_) => {
                warn!(command = name, timeout_ms = %self.timeout_ms(), "storage request timed out");
                Err(anyhow!(
                    "storage worker timed out after {} ms waiting for {name}",
                    self.timeout_ms()
                ))
            }
        }
    }
}

#[async_trait]
impl RequirementsStore for WorkerHandle {
    async fn get_requirements(&self) -> Result<Option<Requirements>> {
        self.request(|reply| StoreCommand::GetRequirements { reply })
            .await
    }

    async fn save_requirements(&self, requirements: &Requirements) -> Result<()> {
        let requirements = requirements.clone();
        self.request(|reply| StoreCommand::SaveRequirements {
            requirements,
            reply,
        })
        .await
    }
}

#[async_trait]
impl CouponStore for WorkerHandle {
    async fn list_coupons(&self) -> Result<Vec<CouponEntry>> {
        self.request(|reply| StoreCommand::ListCoupons { reply }).await
    }

    async fn replace_coupons(&self, numbers: &[String]) -> Result<()> {
        let numbers = numbers.to_vec();
        self.request(|reply| StoreCommand::ReplaceCoupons { numbers, reply })
            .await
    }

    async fn stamp_coupon(&self, coupon_number: &str, rank: i64) -> Result<u64> {
        let coupon_number = coupon_number.to_string();
        self.request(|reply| StoreCommand::StampCoupon {
            coupon_number,
            rank,
            reply,
        })
        .await
    }

    async fn has_prize_stamps(&self) -> Result<bool> {
        self.request(|reply| StoreCommand::HasPrizeStamps { reply })
            .await
    }

    async fn clear_prize_stamps(&self) -> Result<u64> {
        self.request(|reply| StoreCommand::ClearPrizeStamps { reply })
            .await
    }
}

#[async_trait]
impl PrizeLogStore for WorkerHandle {
    async fn list_event_names(&self) -> Result<Vec<String>> {
        self.request(|reply| StoreCommand::ListEventNames { reply })
            .await
    }

    async fn clear_event_records(&self, event_name: &str) -> Result<u64> {
        let event_name = event_name.to_string();
        self.request(|reply| StoreCommand::ClearEventRecords { event_name, reply })
            .await
    }

    async fn append_prize_record(&self, record: &PrizeRecord) -> Result<()> {
        let record = record.clone();
        self.request(|reply| StoreCommand::AppendPrizeRecord { record, reply })
            .await
    }

    async fn list_prize_records(&self, filter: &ReportFilter) -> Result<Vec<PrizeRecord>> {
        let filter = filter.clone();
        self.request(|reply| StoreCommand::ListPrizeRecords { filter, reply })
            .await
    }
}

#[async_trait]
impl DrawStore for WorkerHandle {
    async fn apply_commit(&self, plan: &CommitPlan) -> Result<CommitReceipt, ApplyCommitError> {
        let (reply, response) = oneshot::channel();
        self.enqueue(StoreCommand::ApplyCommit {
            plan: plan.clone(),
            reply,
        })
        .await?;

        match timeout(self.timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ApplyCommitError::Diverged {
                logged: 0,
                stamped: 0,
                source: anyhow!("storage worker stopped while applying the commit; outcome unknown"),
            }),
            Err(_) => {
                warn!(timeout_ms = %self.timeout_ms(), "commit request timed out");
                Err(ApplyCommitError::Diverged {
                    logged: 0,
                    stamped: 0,
                    source: anyhow!(
                        "storage worker timed out after {} ms applying the commit; outcome unknown",
                        self.timeout_ms()
                    ),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/worker_tests.rs"]
mod tests;
