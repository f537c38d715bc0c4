//! Storage layer for the loyalty points service.
//!
//! This crate persists users, orders and withdrawals. Two backends implement
//! the [`Store`] trait:
//!
//! - [`PgStore`]: PostgreSQL through `sqlx`, with embedded migrations
//! - [`MemoryStore`]: a single-lock in-memory store for tests and local runs
//!
//! # Consistency
//!
//! Every balance mutation is a read-then-write on the user row. Both backends
//! serialize those per user: `PgStore` takes `SELECT ... FOR UPDATE` row locks
//! inside a transaction, `MemoryStore` holds its one lock for the whole
//! operation. An accrual credit racing a withdrawal can therefore never lose
//! an update.
//!
//! # Example
//!
//! ```no_run
//! use loyalty_core::{Order, OrderNumber, User};
//! use loyalty_store::{MemoryStore, Store};
//!
//! # async fn example() -> loyalty_store::Result<()> {
//! let store = MemoryStore::new();
//!
//! let user = User::new("alice", "$argon2id$...");
//! store.create_user(&user).await?;
//!
//! let number = OrderNumber::parse("3182649").expect("valid number");
//! store.insert_order(&Order::new(number, user.id)).await?;
//!
//! let waiting = store.list_waiting_orders().await?;
//! assert_eq!(waiting.len(), 1);
//! # Ok(())
//! # }
//! ```

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
use rust_decimal::Decimal;

use loyalty_core::{Balance, Order, OrderStatus, User, UserId, Withdrawal};

/// What happened when an accrual decision was written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccrualOutcome {
    /// The order took the new status and points.
    Applied {
        /// Points added to the owner's balance (zero if none).
        credited: Decimal,
        /// Owner's balance after the credit, when a credit happened.
        balance: Option<Decimal>,
    },
    /// The order had already reached a terminal status; nothing was written.
    AlreadyFinal {
        /// The terminal status found.
        status: OrderStatus,
    },
}

/// The storage trait defining all database operations.
///
/// Implementations must make every compound operation atomic: either all of
/// its writes land or none do.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for diagnostics (`"postgres"`, `"memory"`).
    fn backend(&self) -> &'static str;

    /// Check that the backend can serve requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    async fn ping(&self) -> Result<()>;

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateLogin` if the login is taken.
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Get a user by login.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user_by_login(&self, login: &str) -> Result<Option<User>>;

    // =========================================================================
    // Orders
    // =========================================================================

    /// Get an order by its number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_order_by_number(&self, number: &str) -> Result<Option<Order>>;

    /// Insert a new order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::OrderConflict` if the number is already claimed,
    /// by anyone.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// List a user's orders, oldest upload first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>>;

    /// List every order in `NEW`, `REGISTERED` or `PROCESSING`, in a stable
    /// order (oldest upload first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_waiting_orders(&self) -> Result<Vec<Order>>;

    // =========================================================================
    // Withdrawals
    // =========================================================================

    /// List a user's withdrawals, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_withdrawals_by_user(&self, user_id: &UserId) -> Result<Vec<Withdrawal>>;

    /// Current balance and lifetime withdrawn total.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    async fn balance(&self, user_id: &UserId) -> Result<Balance>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Write an accrual decision onto an order and credit its owner, atomically.
    ///
    /// The order is only touched while still non-terminal. The owner is
    /// credited with the increase of `accrual` over the points already stored
    /// on the order, so the same decision can never be credited twice.
    /// `accrual` is rounded to [`loyalty_core::POINTS_SCALE`] places first.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the order or its owner doesn't exist.
    async fn apply_accrual(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Decimal,
    ) -> Result<AccrualOutcome>;

    /// Debit a user and record the withdrawal, atomically.
    ///
    /// Creates a `PROCESSED` order for the withdrawal reference, appends the
    /// ledger entry and decrements the balance. The balance is re-read under
    /// lock before the check.
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the user doesn't exist.
    /// - `StoreError::InsufficientFunds` if the balance is below the sum.
    /// - `StoreError::OrderConflict` if the reference is already an order.
    async fn withdraw(&self, withdrawal: &Withdrawal) -> Result<Decimal>;

    /// Delete every withdrawal, order and user. Test fixtures only.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn reset(&self) -> Result<()>;
}
