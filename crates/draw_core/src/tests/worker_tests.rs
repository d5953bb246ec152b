use std::sync::atomic::{AtomicUsize, Ordering};

use rand::{rngs::StdRng, SeedableRng};
use shared::{domain::UserId, error::DrawError};

use super::*;
use crate::{
    committer::build_commit_plan,
    memory::MemoryStore,
    operator::FixedAnswer,
    session::{DrawSession, SessionState},
    test_support::{numbered_coupons, requirements},
};

/// Delegates to a `MemoryStore`, sleeping inside the reads it is asked to slow down.
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowStore {
    fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::with_contents(
                Some(requirements("Spring2024", 2, 3)),
                numbered_coupons(1..=20, 4),
                Vec::new(),
            ),
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    async fn pause(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RequirementsStore for SlowStore {
    async fn get_requirements(&self) -> Result<Option<Requirements>> {
        self.pause().await;
        self.inner.get_requirements().await
    }

    async fn save_requirements(&self, requirements: &Requirements) -> Result<()> {
        self.inner.save_requirements(requirements).await
    }
}

#[async_trait]
impl CouponStore for SlowStore {
    async fn list_coupons(&self) -> Result<Vec<CouponEntry>> {
        self.inner.list_coupons().await
    }

    async fn replace_coupons(&self, numbers: &[String]) -> Result<()> {
        self.inner.replace_coupons(numbers).await
    }

    async fn stamp_coupon(&self, coupon_number: &str, rank: i64) -> Result<u64> {
        self.pause().await;
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
impl PrizeLogStore for SlowStore {
    async fn list_event_names(&self) -> Result<Vec<String>> {
        self.inner.list_event_names().await
    }

    async fn clear_event_records(&self, event_name: &str) -> Result<u64> {
        self.inner.clear_event_records(event_name).await
    }

    async fn append_prize_record(&self, record: &PrizeRecord) -> Result<()> {
        self.inner.append_prize_record(record).await
    }

    async fn list_prize_records(&self, filter: &ReportFilter) -> Result<Vec<PrizeRecord>> {
        self.inner.list_prize_records(filter).await
    }
}

impl DrawStore for SlowStore {}

fn options(request_timeout: Duration) -> WorkerOptions {
    WorkerOptions {
        queue_capacity: 8,
        request_timeout,
    }
}

#[tokio::test]
async fn handle_forwards_every_operation() {
    let handle = StorageWorker::spawn(Arc::new(MemoryStore::new()), WorkerOptions::default());

    assert!(handle.get_requirements().await.expect("get").is_none());
    handle
        .save_requirements(&requirements("Spring2024", 2, 3))
        .await
        .expect("save");
    handle
        .replace_coupons(&["0001".to_string(), "0002".to_string()])
        .await
        .expect("replace");
    assert_eq!(handle.stamp_coupon("0002", 1).await.expect("stamp"), 1);
    assert_eq!(handle.stamp_coupon("0099", 1).await.expect("stamp"), 0);
    assert!(handle.has_prize_stamps().await.expect("stamps"));
    assert_eq!(handle.clear_prize_stamps().await.expect("clear"), 1);
    assert_eq!(handle.list_coupons().await.expect("list").len(), 2);

    let reqs = requirements("Spring2024", 1, 1);
    let draw = shared::domain::DrawResult {
        main_prize_numbers: vec!["0001".into()],
        consolation_prize_numbers: vec!["0002".into()],
    };
    let plan = build_commit_plan(
        &draw,
        &reqs,
        &numbered_coupons(1..=2, 4),
        &UserId::from_sequence(1),
        false,
        chrono::Utc::now(),
    );
    let receipt = handle.apply_commit(&plan).await.expect("commit");
    assert_eq!(receipt.logged, 2);
    assert_eq!(receipt.stamped, 2);
    assert_eq!(
        handle.list_event_names().await.expect("names"),
        vec!["Spring2024".to_string()]
    );
    assert_eq!(
        handle
            .list_prize_records(&ReportFilter::for_event("Spring2024"))
            .await
            .expect("records")
            .len(),
        2
    );
    assert_eq!(handle.clear_event_records("Spring2024").await.expect("clear"), 2);
}

#[tokio::test]
async fn concurrent_requests_run_one_at_a_time() {
    let store = Arc::new(SlowStore::new(Duration::from_millis(10)));
    let handle = StorageWorker::spawn(store.clone(), options(Duration::from_secs(5)));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move { handle.get_requirements().await }));
    }
    for task in tasks {
        task.await.expect("join").expect("requirements");
    }
    assert_eq!(store.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_request_times_out() {
    let store = Arc::new(SlowStore::new(Duration::from_millis(400)));
    let handle = StorageWorker::spawn(store, options(Duration::from_millis(40)));

    let err = handle.get_requirements().await.expect_err("times out");
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[tokio::test]
async fn commit_timeout_is_reported_as_unknown_outcome() {
    let store = Arc::new(SlowStore::new(Duration::from_millis(400)));
    let handle = StorageWorker::spawn(store, options(Duration::from_millis(40)));
    let reqs = requirements("Spring2024", 1, 1);
    let draw = shared::domain::DrawResult {
        main_prize_numbers: vec!["0001".into()],
        consolation_prize_numbers: vec!["0002".into()],
    };
    let plan = build_commit_plan(
        &draw,
        &reqs,
        &numbered_coupons(1..=20, 4),
        &UserId::from_sequence(1),
        false,
        chrono::Utc::now(),
    );

    let err = handle.apply_commit(&plan).await.expect_err("times out");
    assert!(matches!(err, ApplyCommitError::Diverged { .. }));
}

#[tokio::test]
async fn session_runs_through_the_worker() {
    let backing = Arc::new(MemoryStore::with_contents(
        Some(requirements("Spring2024", 2, 3)),
        numbered_coupons(1..=20, 4),
        Vec::new(),
    ));
    let handle = Arc::new(StorageWorker::spawn(backing.clone(), WorkerOptions::default()));
    let mut session = DrawSession::new(handle, UserId::from_sequence(1));

    session.load_inventory().await.expect("load");
    session.prepare(&FixedAnswer(false)).await.expect("prepare");
    session
        .start_draw(&mut StdRng::seed_from_u64(21))
        .await
        .expect("draw");
    while session.remaining_slots() > 0 {
        session.reveal_next().await.expect("reveal");
    }
    assert_eq!(session.state(), SessionState::Committed);

    let stamped = backing
        .coupons()
        .await
        .into_iter()
        .filter(|c| c.prize_number.is_some())
        .count();
    assert_eq!(stamped, 5);
}

#[tokio::test]
async fn storage_errors_surface_through_the_session() {
    let handle = Arc::new(StorageWorker::spawn(
        Arc::new(MemoryStore::new()),
        WorkerOptions::default(),
    ));
    let mut session = DrawSession::new(handle, UserId::from_sequence(1));
    assert_eq!(
        session.load_inventory().await,
        Err(DrawError::ConfigurationMissing)
    );
}
