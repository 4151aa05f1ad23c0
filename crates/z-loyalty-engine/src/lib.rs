//! Order reconciliation engine for z-loyalty.
//!
//! The engine discovers orders awaiting an accrual verdict, dispatches
//! bounded-concurrency lookups against the external accrual service, and
//! applies each verdict to order state and user balance through the store.
//!
//! # Architecture
//!
//! - [`Engine`]: owns the lifecycle; a periodic scheduler fans pending
//!   orders out to the pool, one settlement task per order.
//! - [`WorkerPool`]: fixed set of executors over a bounded queue; saturation
//!   applies backpressure to the scheduler instead of dropping work.
//! - [`settle`]: the per-order unit of work.
//! - [`Throttle`]: pool-wide slowdown engaged when the accrual service rate
//!   limits.
//!
//! The engine holds no authoritative state between ticks. Every tick
//! re-reads the pending set from the store, which makes restarts and
//! multi-instance deployments safe.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod engine;
mod pool;
mod settle;
mod throttle;

pub use config::EngineConfig;
pub use engine::Engine;
pub use pool::{PoolClosed, WorkerPool};
pub use settle::{settle, Settlement};
pub use throttle::Throttle;
