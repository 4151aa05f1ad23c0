//! Engine lifecycle and the reconciliation scheduler.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use z_loyalty_accrual::AccrualSource;
use z_loyalty_core::Order;
use z_loyalty_store::Store;

use crate::config::EngineConfig;
use crate::pool::WorkerPool;
use crate::settle::settle;
use crate::throttle::Throttle;

/// The order reconciliation engine.
///
/// [`Engine::start`] spawns a periodic scheduler that fans pending orders
/// out to a bounded worker pool; [`Engine::stop`] halts the cycle, cancels
/// outstanding lookups, and waits for dispatched work to finish. Nothing
/// else calls into the engine's internals.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn Store>,
    source: Arc<dyn AccrualSource>,
    throttle: Throttle,
    state: Mutex<State>,
}

enum State {
    Idle,
    Running {
        shutdown: watch::Sender<bool>,
        scheduler: JoinHandle<()>,
        pool: Arc<WorkerPool>,
    },
    Stopped,
}

impl Engine {
    /// Create an engine over the given store and accrual source.
    #[must_use]
    pub fn new(config: EngineConfig, store: Arc<dyn Store>, source: Arc<dyn AccrualSource>) -> Self {
        Self {
            config,
            store,
            source,
            throttle: Throttle::new(),
            state: Mutex::new(State::Idle),
        }
    }

    /// Begin the periodic reconciliation cycle.
    ///
    /// Calling `start` on an engine that is already running, or that was
    /// stopped, is a logged no-op.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        match *state {
            State::Idle => {}
            State::Running { .. } => {
                warn!("reconciliation engine already running");
                return;
            }
            State::Stopped => {
                warn!("reconciliation engine already stopped");
                return;
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pool = Arc::new(WorkerPool::new(
            self.config.workers,
            self.config.queue_capacity,
        ));

        let scheduler = tokio::spawn(run_scheduler(
            self.config.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.source),
            self.throttle.clone(),
            Arc::clone(&pool),
            shutdown_rx,
        ));

        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            "reconciliation engine started"
        );

        *state = State::Running {
            shutdown: shutdown_tx,
            scheduler,
            pool,
        };
    }

    /// Halt the cycle and wait for dispatched work to complete or observe
    /// cancellation. Safe to call more than once.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, State::Stopped);

        let State::Running {
            shutdown,
            scheduler,
            pool,
        } = previous
        else {
            return;
        };

        let _ = shutdown.send(true);
        if let Err(err) = scheduler.await {
            error!(error = %err, "scheduler task failed");
        }
        pool.stop().await;

        info!("reconciliation engine stopped");
    }
}

/// Periodic fan-out loop: tick, fetch pending orders, one settlement task
/// per order. No business logic lives here.
async fn run_scheduler(
    config: EngineConfig,
    store: Arc<dyn Store>,
    source: Arc<dyn AccrualSource>,
    throttle: Throttle,
    pool: Arc<WorkerPool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(config.poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = tick.tick() => {
                if throttle.is_engaged() {
                    debug!("reconciliation paused by rate limit, skipping tick");
                    continue;
                }

                let orders = match store.fetch_pending_orders().await {
                    Ok(orders) => orders,
                    Err(err) => {
                        // A failed tick is skipped; the next one retries.
                        warn!(error = %err, "cannot fetch pending orders");
                        continue;
                    }
                };

                if orders.is_empty() {
                    continue;
                }
                debug!(count = orders.len(), "dispatching settlement tasks");

                for order in orders {
                    let task = settlement_task(
                        &config,
                        &store,
                        &source,
                        &throttle,
                        shutdown.clone(),
                        order,
                    );
                    if pool.submit(task).await.is_err() {
                        warn!("worker pool closed, stopping dispatch");
                        return;
                    }
                }
            }
        }
    }
}

/// Wrap one order's settlement with the task deadline and the shutdown
/// signal, so a stop never leaves an executor orphaned on a slow lookup.
fn settlement_task(
    config: &EngineConfig,
    store: &Arc<dyn Store>,
    source: &Arc<dyn AccrualSource>,
    throttle: &Throttle,
    mut shutdown: watch::Receiver<bool>,
    order: Order,
) -> impl std::future::Future<Output = ()> + Send + 'static {
    let store = Arc::clone(store);
    let source = Arc::clone(source);
    let throttle = throttle.clone();
    let task_timeout = config.task_timeout;
    let rate_limit_pause = config.rate_limit_pause;

    async move {
        if *shutdown.borrow() {
            debug!(order_number = %order.number, "settlement abandoned during shutdown");
            return;
        }

        let work = settle(
            store.as_ref(),
            source.as_ref(),
            &order,
            &throttle,
            rate_limit_pause,
        );

        tokio::select! {
            _ = shutdown.changed() => {
                debug!(order_number = %order.number, "settlement abandoned during shutdown");
            }
            outcome = tokio::time::timeout(task_timeout, work) => match outcome {
                Ok(Ok(settlement)) => {
                    debug!(order_number = %order.number, ?settlement, "settlement task finished");
                }
                Ok(Err(err)) => {
                    warn!(order_number = %order.number, error = %err, "cannot persist settlement");
                }
                Err(_) => {
                    warn!(order_number = %order.number, "settlement timed out");
                }
            },
        }
    }
}
