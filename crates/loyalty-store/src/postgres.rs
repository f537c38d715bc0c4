//! PostgreSQL storage implementation.
//!
//! Compound operations run in a transaction and lock the rows they
//! read-modify-write with `SELECT ... FOR UPDATE`, so an accrual credit and a
//! withdrawal for the same user are serialized on the user row.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use loyalty_core::{
    round_points, Balance, Order, OrderId, OrderStatus, User, UserId, Withdrawal, WithdrawalId,
};

use crate::error::{Result, StoreError};
use crate::{AccrualOutcome, Store};

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    login: String,
    password_hash: String,
    balance: Decimal,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            login: row.login,
            password_hash: row.password_hash,
            balance: row.balance,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    number: String,
    user_id: Uuid,
    status: String,
    accrual: Decimal,
    uploaded_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Self {
            id: OrderId::from_uuid(row.id),
            number: row.number,
            user_id: UserId::from_uuid(row.user_id),
            status,
            accrual: row.accrual,
            uploaded_at: row.uploaded_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct WithdrawalRow {
    id: Uuid,
    user_id: Uuid,
    order_number: String,
    sum: Decimal,
    processed_at: DateTime<Utc>,
}

impl From<WithdrawalRow> for Withdrawal {
    fn from(row: WithdrawalRow) -> Self {
        Self {
            id: WithdrawalId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            order: row.order_number,
            sum: row.sum,
            processed_at: row.processed_at,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ============================================================================
// PgStore
// ============================================================================

/// PostgreSQL-backed storage implementation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to PostgreSQL.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be established.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Borrow the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_order_in(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<()> {
        sqlx::query(
            r"INSERT INTO orders (id, number, user_id, status, accrual, uploaded_at)
               VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(order.id.as_uuid())
        .bind(&order.number)
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.accrual)
        .bind(order.uploaded_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::OrderConflict {
                    number: order.number.clone(),
                }
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn lock_user_balance(
        tx: &mut Transaction<'_, Postgres>,
        user_id: &UserId,
    ) -> Result<Decimal> {
        sqlx::query_scalar::<_, Decimal>("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            })
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r"INSERT INTO users (id, login, password_hash, balance, created_at)
               VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(user.balance)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateLogin {
                    login: user.login.clone(),
                }
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r"SELECT id, login, password_hash, balance, created_at
               FROM users WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r"SELECT id, login, password_hash, balance, created_at
               FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    // =========================================================================
    // Orders
    // =========================================================================

    async fn get_order_by_number(&self, number: &str) -> Result<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            r"SELECT id, number, user_id, status, accrual, uploaded_at
               FROM orders WHERE number = $1",
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_order_in(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r"SELECT id, number, user_id, status, accrual, uploaded_at
               FROM orders WHERE user_id = $1
               ORDER BY uploaded_at, id",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn list_waiting_orders(&self) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r"SELECT id, number, user_id, status, accrual, uploaded_at
               FROM orders WHERE status IN ('NEW', 'REGISTERED', 'PROCESSING')
               ORDER BY uploaded_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    // =========================================================================
    // Withdrawals
    // =========================================================================

    async fn list_withdrawals_by_user(&self, user_id: &UserId) -> Result<Vec<Withdrawal>> {
        let rows: Vec<WithdrawalRow> = sqlx::query_as(
            r"SELECT id, user_id, order_number, sum, processed_at
               FROM withdrawals WHERE user_id = $1
               ORDER BY processed_at, id",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Withdrawal::from).collect())
    }

    async fn balance(&self, user_id: &UserId) -> Result<Balance> {
        let row: Option<(Decimal, Decimal)> = sqlx::query_as(
            r"SELECT u.balance,
                      COALESCE((SELECT SUM(w.sum) FROM withdrawals w WHERE w.user_id = u.id), 0)
               FROM users u WHERE u.id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let (current, withdrawn) = row.ok_or_else(|| StoreError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })?;
        Ok(Balance { current, withdrawn })
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    async fn apply_accrual(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<AccrualOutcome> {
        let accrual = round_points(accrual);
        let mut tx = self.pool.begin().await?;

        let row: Option<OrderRow> = sqlx::query_as(
            r"SELECT id, number, user_id, status, accrual, uploaded_at
               FROM orders WHERE number = $1 FOR UPDATE",
        )
        .bind(number)
        .fetch_optional(&mut *tx)
        .await?;

        let order = row
            .map(Order::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: number.to_string(),
            })?;

        if order.status.is_terminal() {
            // Dropping the transaction rolls it back and releases the lock.
            return Ok(AccrualOutcome::AlreadyFinal {
                status: order.status,
            });
        }

        sqlx::query("UPDATE orders SET status = $1, accrual = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(accrual)
            .bind(order.id.as_uuid())
            .execute(&mut *tx)
            .await?;

        let credited = (accrual - order.accrual).max(Decimal::ZERO);
        let balance = if credited > Decimal::ZERO {
            let current = Self::lock_user_balance(&mut tx, &order.user_id).await?;
            let updated = current + credited;
            sqlx::query("UPDATE users SET balance = $1 WHERE id = $2")
                .bind(updated)
                .bind(order.user_id.as_uuid())
                .execute(&mut *tx)
                .await?;
            Some(updated)
        } else {
            None
        };

        tx.commit().await?;
        Ok(AccrualOutcome::Applied { credited, balance })
    }

    async fn withdraw(&self, withdrawal: &Withdrawal) -> Result<Decimal> {
        let mut tx = self.pool.begin().await?;

        let balance = Self::lock_user_balance(&mut tx, &withdrawal.user_id).await?;
        if balance < withdrawal.sum {
            return Err(StoreError::InsufficientFunds {
                balance,
                requested: withdrawal.sum,
            });
        }

        let settling = Order::settled(withdrawal.order.clone(), withdrawal.user_id);
        Self::insert_order_in(&mut tx, &settling).await?;

        sqlx::query(
            r"INSERT INTO withdrawals (id, user_id, order_number, sum, processed_at)
               VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(withdrawal.id.as_uuid())
        .bind(withdrawal.user_id.as_uuid())
        .bind(&withdrawal.order)
        .bind(withdrawal.sum)
        .bind(withdrawal.processed_at)
        .execute(&mut *tx)
        .await?;

        let updated = balance - withdrawal.sum;
        sqlx::query("UPDATE users SET balance = $1 WHERE id = $2")
            .bind(updated)
            .bind(withdrawal.user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn reset(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM withdrawals")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM orders").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM users").execute(&mut *tx).await?;
        tx.commit().await?;
        tracing::info!("All loyalty data deleted");
        Ok(())
    }
}
