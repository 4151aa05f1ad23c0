//! Per-order settlement: one accrual lookup folded into order and balance
//! state.

use std::time::Duration;

use tracing::{debug, info, warn};

use z_loyalty_accrual::{AccrualSource, Verdict};
use z_loyalty_core::{Order, OrderStatus};
use z_loyalty_store::{Store, StoreError};

use crate::throttle::Throttle;

/// Outcome of settling one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// A terminal verdict was persisted, balance credit included when due.
    Applied,

    /// Another settlement already moved the order to a terminal state; this
    /// verdict was discarded without touching the balance.
    AlreadySettled,

    /// The accrual service is still deciding; the order was marked
    /// `PROCESSING`.
    InProgress,

    /// The accrual service has no record of the order; state untouched.
    Unknown,

    /// The service was unavailable, rate limited, or answered garbage; state
    /// untouched, the next scheduler tick retries.
    Deferred,
}

/// Settle one order against the accrual service.
///
/// Idempotent per call given the same persisted order state: a repeated
/// pending verdict re-marks `PROCESSING`, and a repeated terminal verdict is
/// discarded by the store's status guard, so the balance is credited at most
/// once per order.
///
/// # Errors
///
/// Returns an error when persisting the verdict fails; the order is left in
/// whatever state the store last committed and the next tick retries it.
pub async fn settle(
    store: &dyn Store,
    source: &dyn AccrualSource,
    order: &Order,
    throttle: &Throttle,
    rate_limit_pause: Duration,
) -> Result<Settlement, StoreError> {
    let verdict = match source.lookup(&order.number).await {
        Ok(verdict) => verdict,
        Err(err) if err.is_decode() => {
            warn!(
                order_number = %order.number,
                error = %err,
                "accrual response malformed, deferring order"
            );
            return Ok(Settlement::Deferred);
        }
        Err(err) => {
            warn!(
                order_number = %order.number,
                error = %err,
                "accrual service unavailable, deferring order"
            );
            return Ok(Settlement::Deferred);
        }
    };

    match verdict {
        Verdict::Unknown => {
            debug!(order_number = %order.number, "order not known to accrual service");
            Ok(Settlement::Unknown)
        }
        Verdict::RateLimited { retry_after } => {
            let pause = retry_after.unwrap_or(rate_limit_pause);
            throttle.engage(pause);
            warn!(
                order_number = %order.number,
                pause_secs = pause.as_secs(),
                "accrual service rate limited, pausing reconciliation"
            );
            Ok(Settlement::Deferred)
        }
        Verdict::Pending => {
            store
                .apply_verdict(&order.number, OrderStatus::Processing, None)
                .await?;
            debug!(order_number = %order.number, "accrual verdict still pending");
            Ok(Settlement::InProgress)
        }
        Verdict::Decided {
            status,
            accrual_cents,
        } => {
            let accrual = (status == OrderStatus::Processed).then_some(accrual_cents);
            if store.apply_verdict(&order.number, status, accrual).await? {
                info!(
                    order_number = %order.number,
                    status = %status,
                    accrual_cents,
                    "order settled"
                );
                Ok(Settlement::Applied)
            } else {
                debug!(order_number = %order.number, "order already terminal, verdict discarded");
                Ok(Settlement::AlreadySettled)
            }
        }
    }
}
