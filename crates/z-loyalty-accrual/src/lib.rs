//! Accrual service client for z-loyalty.
//!
//! This crate wraps the single outbound call the reconciliation engine makes
//! against the external accrual service and classifies the response into the
//! [`Verdict`] taxonomy the settlement logic consumes.
//!
//! # Example
//!
//! ```no_run
//! use z_loyalty_accrual::{AccrualClient, AccrualSource, Verdict};
//!
//! # async fn example() -> Result<(), z_loyalty_accrual::AccrualError> {
//! let client = AccrualClient::new("http://accrual.loyalty.svc:8080");
//!
//! match client.lookup("79927398713").await? {
//!     Verdict::Decided { status, accrual_cents } => {
//!         println!("decided: {status} ({accrual_cents} cents)");
//!     }
//!     verdict => println!("not settled yet: {verdict:?}"),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod retry;
mod types;

pub use client::{AccrualClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::AccrualError;
pub use retry::RetryPolicy;
pub use types::Verdict;

use async_trait::async_trait;

/// The accrual lookup boundary consumed by the reconciliation engine.
///
/// Implemented by [`AccrualClient`] against the real service and by stubs in
/// engine tests.
#[async_trait]
pub trait AccrualSource: Send + Sync {
    /// Resolve the accrual verdict for one order number.
    ///
    /// # Errors
    ///
    /// Returns an error when the service stays unreachable after retries or
    /// answers with a body that cannot be decoded.
    async fn lookup(&self, order_number: &str) -> Result<Verdict, AccrualError>;
}
