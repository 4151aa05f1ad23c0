//! Storage layer for z-loyalty.
//!
//! This crate persists orders, balances, and withdrawal history, and exposes
//! the [`Store`] trait the reconciliation engine and the withdrawal path run
//! against.
//!
//! # Backends
//!
//! - [`PgStore`]: PostgreSQL via sqlx, with embedded migrations.
//! - [`MemoryStore`]: mutex-guarded maps with the same semantics, for tests
//!   and local development.
//!
//! # Atomicity
//!
//! Balance mutations are single atomic updates at the store layer: a credit
//! is one `current = current + n` expression, a debit is a guarded
//! `current = current - n WHERE current >= n`. Concurrent settlement and
//! withdrawal therefore never lose updates, and `current` never goes
//! negative.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use z_loyalty_core::{Balance, Order, OrderStatus, UserId, Withdrawal};

/// The storage trait defining all ledger operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (PostgreSQL in production, in-memory for testing).
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Create a user with a zero balance and return the new id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateLogin` if the login is already taken.
    async fn create_user(&self, login: &str) -> Result<UserId>;

    // =========================================================================
    // Order Operations
    // =========================================================================

    /// Record a newly submitted order with status `NEW`.
    ///
    /// # Errors
    ///
    /// - `StoreError::AlreadyUploaded` if this user already submitted the
    ///   number.
    /// - `StoreError::AlreadyUploadedByOther` if another user owns it.
    async fn save_order(&self, user_id: UserId, number: &str) -> Result<()>;

    /// Look up one order by its external number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_order(&self, number: &str) -> Result<Option<Order>>;

    /// List a user's orders, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Fetch every order not yet in a terminal state.
    ///
    /// An empty ledger is an empty `Vec`, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn fetch_pending_orders(&self) -> Result<Vec<Order>>;

    /// Apply a settlement verdict in one transaction.
    ///
    /// Updates status and accrual only while the order is still
    /// non-terminal; when the new status is `Processed` with a positive
    /// accrual, the owner's balance is credited in the same transaction.
    ///
    /// Returns whether the order actually transitioned. `false` means it was
    /// already terminal, and nothing (including the credit) was applied.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such order exists.
    async fn apply_verdict(
        &self,
        number: &str,
        status: OrderStatus,
        accrual_cents: Option<i64>,
    ) -> Result<bool>;

    // =========================================================================
    // Balance Operations
    // =========================================================================

    /// Get a user's balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user has no balance row.
    async fn get_balance(&self, user_id: UserId) -> Result<Balance>;

    /// Credit a balance atomically.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user has no balance row.
    async fn credit_balance(&self, user_id: UserId, amount_cents: i64) -> Result<()>;

    /// Debit a balance and record the withdrawal, atomically.
    ///
    /// # Errors
    ///
    /// - `StoreError::InsufficientBalance` if the balance cannot cover the
    ///   debit; the balance is left untouched.
    /// - `StoreError::NotFound` if the user has no balance row.
    async fn withdraw(&self, user_id: UserId, order_number: &str, sum_cents: i64) -> Result<()>;

    /// List a user's withdrawal history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>>;
}
