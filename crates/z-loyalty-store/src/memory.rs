//! In-memory storage implementation.
//!
//! Mirrors the PostgreSQL semantics behind a single mutex, which serializes
//! every balance read-modify-write the same way the SQL update expressions
//! do. Used by the engine tests and for local development without a
//! database.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use z_loyalty_core::{Balance, Order, OrderStatus, UserId, Withdrawal};

use crate::error::{Result, StoreError};
use crate::Store;

/// In-memory [`Store`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_user_id: i64,
    next_order_id: i64,
    logins: HashMap<String, UserId>,
    orders: BTreeMap<String, Order>,
    balances: HashMap<UserId, Balance>,
    withdrawals: HashMap<UserId, Vec<Withdrawal>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, login: &str) -> Result<UserId> {
        let mut inner = self.inner.lock().await;

        if inner.logins.contains_key(login) {
            return Err(StoreError::DuplicateLogin);
        }

        inner.next_user_id += 1;
        let id = UserId::new(inner.next_user_id);
        inner.logins.insert(login.to_string(), id);
        inner.balances.insert(id, Balance::default());

        Ok(id)
    }

    async fn save_order(&self, user_id: UserId, number: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner.orders.get(number) {
            return Err(if existing.user_id == user_id {
                StoreError::AlreadyUploaded
            } else {
                StoreError::AlreadyUploadedByOther
            });
        }

        inner.next_order_id += 1;
        let order = Order {
            id: inner.next_order_id,
            user_id,
            number: number.to_string(),
            status: OrderStatus::New,
            accrual_cents: None,
            uploaded_at: Utc::now(),
        };
        inner.orders.insert(number.to_string(), order);

        Ok(())
    }

    async fn get_order(&self, number: &str) -> Result<Option<Order>> {
        Ok(self.inner.lock().await.orders.get(number).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.uploaded_at);
        Ok(orders)
    }

    async fn fetch_pending_orders(&self) -> Result<Vec<Order>> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.uploaded_at);
        Ok(orders)
    }

    async fn apply_verdict(
        &self,
        number: &str,
        status: OrderStatus,
        accrual_cents: Option<i64>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let Inner {
            orders, balances, ..
        } = &mut *inner;

        let order = orders.get_mut(number).ok_or(StoreError::NotFound)?;
        if order.status.is_terminal() {
            return Ok(false);
        }

        order.status = status;
        order.accrual_cents = accrual_cents;

        if status == OrderStatus::Processed {
            if let Some(cents) = accrual_cents.filter(|c| *c > 0) {
                let balance = balances.entry(order.user_id).or_default();
                balance.current_cents += cents;
            }
        }

        Ok(true)
    }

    async fn get_balance(&self, user_id: UserId) -> Result<Balance> {
        self.inner
            .lock()
            .await
            .balances
            .get(&user_id)
            .copied()
            .ok_or(StoreError::NotFound)
    }

    async fn credit_balance(&self, user_id: UserId, amount_cents: i64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let balance = inner
            .balances
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        balance.current_cents += amount_cents;
        Ok(())
    }

    async fn withdraw(&self, user_id: UserId, order_number: &str, sum_cents: i64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Inner {
            balances,
            withdrawals,
            ..
        } = &mut *inner;

        let balance = balances.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        if !balance.can_cover(sum_cents) {
            return Err(StoreError::InsufficientBalance {
                balance: balance.current_cents,
                requested: sum_cents,
            });
        }

        balance.current_cents -= sum_cents;
        balance.withdrawn_cents += sum_cents;
        withdrawals.entry(user_id).or_default().push(Withdrawal {
            order_number: order_number.to_string(),
            sum_cents,
            processed_at: Utc::now(),
        });

        Ok(())
    }

    async fn withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>> {
        Ok(self
            .inner
            .lock()
            .await
            .withdrawals
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
