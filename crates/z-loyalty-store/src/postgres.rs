//! PostgreSQL storage implementation.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use z_loyalty_core::{Balance, Order, OrderStatus, UserId, Withdrawal};

use crate::error::{Result, StoreError};
use crate::Store;

/// PostgreSQL-backed storage implementation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database and run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;

        sqlx::migrate!().run(&pool).await?;
        tracing::info!("database migrations applied");

        Ok(Self { pool })
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Store for PgStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    async fn create_user(&self, login: &str) -> Result<UserId> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("INSERT INTO users (login) VALUES ($1) RETURNING id")
            .bind(login)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateLogin
                } else {
                    e.into()
                }
            })?;
        let id: i64 = row.try_get("id")?;

        sqlx::query("INSERT INTO balances (user_id) VALUES ($1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(UserId::new(id))
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    async fn save_order(&self, user_id: UserId, number: &str) -> Result<()> {
        if let Some(existing) = self.get_order(number).await? {
            return Err(already_uploaded(&existing, user_id));
        }

        let inserted = sqlx::query(
            "INSERT INTO orders (user_id, order_number, status, uploaded_at) \
             VALUES ($1, $2, $3, now())",
        )
        .bind(user_id.as_i64())
        .bind(number)
        .bind(OrderStatus::New.as_str())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            // Lost a submission race; classify against the winner.
            Err(e) if is_unique_violation(&e) => match self.get_order(number).await? {
                Some(existing) => Err(already_uploaded(&existing, user_id)),
                None => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn get_order(&self, number: &str) -> Result<Option<Order>> {
        sqlx::query(
            "SELECT id, user_id, order_number, status, accrual, uploaded_at \
             FROM orders WHERE order_number = $1",
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| order_from_row(&row))
        .transpose()
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT id, user_id, order_number, status, accrual, uploaded_at \
             FROM orders WHERE user_id = $1 ORDER BY uploaded_at",
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn fetch_pending_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT id, user_id, order_number, status, accrual, uploaded_at \
             FROM orders WHERE status NOT IN ('PROCESSED', 'INVALID') \
             ORDER BY uploaded_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn apply_verdict(
        &self,
        number: &str,
        status: OrderStatus,
        accrual_cents: Option<i64>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // The status guard makes settlement idempotent: a terminal order is
        // never touched again, so the credit below cannot be applied twice.
        let row = sqlx::query(
            "UPDATE orders SET status = $2, accrual = $3 \
             WHERE order_number = $1 AND status NOT IN ('PROCESSED', 'INVALID') \
             RETURNING user_id",
        )
        .bind(number)
        .bind(status.as_str())
        .bind(accrual_cents)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            // Distinguish "already terminal" from "no such order".
            return match self.get_order(number).await? {
                Some(_) => Ok(false),
                None => Err(StoreError::NotFound),
            };
        };

        if status == OrderStatus::Processed {
            if let Some(cents) = accrual_cents.filter(|c| *c > 0) {
                let user_id: i64 = row.try_get("user_id")?;
                sqlx::query("UPDATE balances SET current = current + $2 WHERE user_id = $1")
                    .bind(user_id)
                    .bind(cents)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(true)
    }

    // =========================================================================
    // Balance Operations
    // =========================================================================

    async fn get_balance(&self, user_id: UserId) -> Result<Balance> {
        let row = sqlx::query("SELECT current, withdrawn FROM balances WHERE user_id = $1")
            .bind(user_id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        Ok(Balance {
            current_cents: row.try_get("current")?,
            withdrawn_cents: row.try_get("withdrawn")?,
        })
    }

    async fn credit_balance(&self, user_id: UserId, amount_cents: i64) -> Result<()> {
        let updated =
            sqlx::query("UPDATE balances SET current = current + $2 WHERE user_id = $1")
                .bind(user_id.as_i64())
                .bind(amount_cents)
                .execute(&self.pool)
                .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn withdraw(&self, user_id: UserId, order_number: &str, sum_cents: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let debited = sqlx::query(
            "UPDATE balances SET current = current - $2, withdrawn = withdrawn + $2 \
             WHERE user_id = $1 AND current >= $2",
        )
        .bind(user_id.as_i64())
        .bind(sum_cents)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            let row = sqlx::query("SELECT current FROM balances WHERE user_id = $1")
                .bind(user_id.as_i64())
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;

            return Err(match row {
                Some(row) => StoreError::InsufficientBalance {
                    balance: row.try_get("current")?,
                    requested: sum_cents,
                },
                None => StoreError::NotFound,
            });
        }

        sqlx::query(
            "INSERT INTO withdrawals (user_id, order_number, sum, processed_at) \
             VALUES ($1, $2, $3, now())",
        )
        .bind(user_id.as_i64())
        .bind(order_number)
        .bind(sum_cents)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn withdrawals(&self, user_id: UserId) -> Result<Vec<Withdrawal>> {
        let rows = sqlx::query(
            "SELECT order_number, sum, processed_at FROM withdrawals \
             WHERE user_id = $1 ORDER BY processed_at",
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Withdrawal {
                    order_number: row.try_get("order_number")?,
                    sum_cents: row.try_get("sum")?,
                    processed_at: row.try_get("processed_at")?,
                })
            })
            .collect()
    }
}

/// Map an order row to the domain type.
fn order_from_row(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::Database(e.to_string()))?;

    Ok(Order {
        id: row.try_get("id")?,
        user_id: UserId::new(row.try_get("user_id")?),
        number: row.try_get("order_number")?,
        status,
        accrual_cents: row.try_get("accrual")?,
        uploaded_at: row.try_get("uploaded_at")?,
    })
}

fn already_uploaded(existing: &Order, submitter: UserId) -> StoreError {
    if existing.user_id == submitter {
        StoreError::AlreadyUploaded
    } else {
        StoreError::AlreadyUploadedByOther
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
