//! Reconciliation engine integration tests over the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use z_loyalty_accrual::{AccrualClient, AccrualError, AccrualSource, RetryPolicy, Verdict};
use z_loyalty_core::{Order, OrderStatus, UserId};
use z_loyalty_engine::{settle, Engine, EngineConfig, Settlement, Throttle};
use z_loyalty_store::{MemoryStore, Store};

const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(60);

/// Accrual stub answering every lookup with the same scripted result.
struct FixedSource {
    verdict: Verdict,
    lookups: AtomicUsize,
}

impl FixedSource {
    fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AccrualSource for FixedSource {
    async fn lookup(&self, _order_number: &str) -> Result<Verdict, AccrualError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict.clone())
    }
}

/// Accrual stub whose lookups never resolve.
struct HangingSource;

#[async_trait]
impl AccrualSource for HangingSource {
    async fn lookup(&self, _order_number: &str) -> Result<Verdict, AccrualError> {
        futures_pending().await
    }
}

async fn futures_pending() -> Result<Verdict, AccrualError> {
    std::future::pending::<()>().await;
    unreachable!()
}

/// Accrual stub that always fails decoding.
struct MalformedSource;

#[async_trait]
impl AccrualSource for MalformedSource {
    async fn lookup(&self, _order_number: &str) -> Result<Verdict, AccrualError> {
        Err(AccrualError::Decode(
            serde_json::from_str::<serde_json::Value>("not json").unwrap_err(),
        ))
    }
}

async fn seeded_store(number: &str) -> (Arc<MemoryStore>, UserId) {
    let store = Arc::new(MemoryStore::new());
    let user = store.create_user("alice").await.unwrap();
    store.save_order(user, number).await.unwrap();
    (store, user)
}

async fn pending_order(store: &MemoryStore, number: &str) -> Order {
    store.get_order(number).await.unwrap().unwrap()
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::from_millis(10),
        workers: 4,
        queue_capacity: 16,
        task_timeout: Duration::from_secs(2),
        rate_limit_pause: RATE_LIMIT_PAUSE,
    }
}

// ============================================================================
// Settlement logic
// ============================================================================

#[tokio::test]
async fn repeated_pending_verdicts_change_nothing() {
    let (store, user) = seeded_store("79927398713").await;
    let source = FixedSource::new(Verdict::Pending);
    let throttle = Throttle::new();

    for _ in 0..3 {
        let order = pending_order(&store, "79927398713").await;
        let outcome = settle(&*store, &source, &order, &throttle, RATE_LIMIT_PAUSE)
            .await
            .unwrap();
        assert_eq!(outcome, Settlement::InProgress);
    }

    let order = pending_order(&store, "79927398713").await;
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.accrual_cents, None);
    assert_eq!(store.get_balance(user).await.unwrap().current_cents, 0);
}

#[tokio::test]
async fn processed_verdict_credits_exactly_once() {
    let (store, user) = seeded_store("79927398713").await;
    let source = FixedSource::new(Verdict::Decided {
        status: OrderStatus::Processed,
        accrual_cents: 500,
    });
    let throttle = Throttle::new();

    let order = pending_order(&store, "79927398713").await;
    let outcome = settle(&*store, &source, &order, &throttle, RATE_LIMIT_PAUSE)
        .await
        .unwrap();
    assert_eq!(outcome, Settlement::Applied);
    assert_eq!(store.get_balance(user).await.unwrap().current_cents, 500);

    // The scheduler would not resubmit a terminal order...
    assert!(store.fetch_pending_orders().await.unwrap().is_empty());

    // ...and even a forced re-settlement is discarded by the status guard.
    let order = store.get_order("79927398713").await.unwrap().unwrap();
    let outcome = settle(&*store, &source, &order, &throttle, RATE_LIMIT_PAUSE)
        .await
        .unwrap();
    assert_eq!(outcome, Settlement::AlreadySettled);
    assert_eq!(store.get_balance(user).await.unwrap().current_cents, 500);
}

#[tokio::test]
async fn invalid_verdict_is_terminal_without_credit() {
    let (store, user) = seeded_store("79927398713").await;
    let source = FixedSource::new(Verdict::Decided {
        status: OrderStatus::Invalid,
        accrual_cents: 0,
    });
    let throttle = Throttle::new();

    let order = pending_order(&store, "79927398713").await;
    let outcome = settle(&*store, &source, &order, &throttle, RATE_LIMIT_PAUSE)
        .await
        .unwrap();
    assert_eq!(outcome, Settlement::Applied);

    let order = store.get_order("79927398713").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Invalid);
    assert_eq!(order.accrual_cents, None);
    assert_eq!(store.get_balance(user).await.unwrap().current_cents, 0);
}

#[tokio::test]
async fn unknown_order_is_left_untouched() {
    let (store, user) = seeded_store("79927398713").await;
    let source = FixedSource::new(Verdict::Unknown);
    let throttle = Throttle::new();

    let order = pending_order(&store, "79927398713").await;
    let outcome = settle(&*store, &source, &order, &throttle, RATE_LIMIT_PAUSE)
        .await
        .unwrap();
    assert_eq!(outcome, Settlement::Unknown);

    let order = store.get_order("79927398713").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(store.get_balance(user).await.unwrap().current_cents, 0);
}

#[tokio::test]
async fn malformed_response_defers_without_state_change() {
    let (store, user) = seeded_store("79927398713").await;
    let throttle = Throttle::new();

    let order = pending_order(&store, "79927398713").await;
    let outcome = settle(&*store, &MalformedSource, &order, &throttle, RATE_LIMIT_PAUSE)
        .await
        .unwrap();
    assert_eq!(outcome, Settlement::Deferred);

    let order = store.get_order("79927398713").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(store.get_balance(user).await.unwrap().current_cents, 0);
    assert!(!throttle.is_engaged());
}

#[tokio::test]
async fn rate_limit_engages_the_throttle() {
    let (store, _user) = seeded_store("79927398713").await;
    let source = FixedSource::new(Verdict::RateLimited {
        retry_after: Some(Duration::from_secs(30)),
    });
    let throttle = Throttle::new();

    let order = pending_order(&store, "79927398713").await;
    let outcome = settle(&*store, &source, &order, &throttle, RATE_LIMIT_PAUSE)
        .await
        .unwrap();
    assert_eq!(outcome, Settlement::Deferred);
    assert!(throttle.is_engaged());

    let order = store.get_order("79927398713").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::New);
}

// ============================================================================
// Engine lifecycle
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn engine_settles_orders_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders/12345"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "order": "12345",
            "status": "PROCESSED",
            "accrual": 5.5
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let user = store.create_user("alice").await.unwrap();
    store.save_order(user, "12345").await.unwrap();

    let client = AccrualClient::with_policy(
        server.uri(),
        RetryPolicy::default(),
        Duration::from_secs(1),
    );
    let engine = Engine::new(fast_config(), store.clone(), Arc::new(client));
    engine.start().await;

    let mut settled = false;
    for _ in 0..100 {
        let order = store.get_order("12345").await.unwrap().unwrap();
        if order.status == OrderStatus::Processed {
            assert_eq!(order.accrual_cents, Some(550));
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(settled, "order was not settled within the deadline");
    assert_eq!(store.get_balance(user).await.unwrap().current_cents, 550);

    engine.stop().await;
    engine.stop().await; // idempotent

    // Terminal order stays terminal; nothing re-credits after a restart of
    // the cycle either, because the pending scan excludes it.
    assert!(store.fetch_pending_orders().await.unwrap().is_empty());
    assert_eq!(store.get_balance(user).await.unwrap().current_cents, 550);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_cancels_inflight_settlement() {
    let store = Arc::new(MemoryStore::new());
    let user = store.create_user("alice").await.unwrap();
    for i in 0..5 {
        store.save_order(user, &format!("{i}")).await.unwrap();
    }

    let engine = Engine::new(fast_config(), store.clone(), Arc::new(HangingSource));
    engine.start().await;

    // Let the scheduler dispatch lookups that will never resolve on their own.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(5), engine.stop()).await;
    assert!(stopped.is_ok(), "stop did not drain in-flight settlement");

    // Abandoned orders are untouched and picked up by the next run.
    assert_eq!(store.fetch_pending_orders().await.unwrap().len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rate_limited_oracle_pauses_the_whole_pool() {
    let store = Arc::new(MemoryStore::new());
    let user = store.create_user("alice").await.unwrap();
    store.save_order(user, "79927398713").await.unwrap();

    let source = Arc::new(FixedSource::new(Verdict::RateLimited {
        retry_after: Some(Duration::from_secs(60)),
    }));
    let engine = Engine::new(fast_config(), store.clone(), source.clone());
    engine.start().await;

    // Many poll intervals pass, but after the first rate-limited answer the
    // scheduler skips its ticks instead of hammering the service.
    tokio::time::sleep(Duration::from_millis(200)).await;
    engine.stop().await;

    assert!(source.lookups.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn start_twice_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(fast_config(), store, Arc::new(FixedSource::new(Verdict::Unknown)));

    engine.start().await;
    engine.start().await;
    engine.stop().await;
}
