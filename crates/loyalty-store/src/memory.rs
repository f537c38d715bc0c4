//! In-memory storage implementation.
//!
//! A single `tokio` mutex guards all tables, so every operation (compound
//! ones included) runs in isolation from every other.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use loyalty_core::{round_points, Balance, Order, OrderStatus, User, UserId, Withdrawal};

use crate::error::{Result, StoreError};
use crate::{AccrualOutcome, Store};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    logins: HashMap<String, UserId>,
    // Insertion order doubles as upload order.
    orders: Vec<Order>,
    order_index: HashMap<String, usize>,
    withdrawals: Vec<Withdrawal>,
}

impl Tables {
    fn user_mut(&mut self, user_id: &UserId) -> Result<&mut User> {
        self.users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            })
    }

    fn push_order(&mut self, order: &Order) -> Result<()> {
        if self.order_index.contains_key(&order.number) {
            return Err(StoreError::OrderConflict {
                number: order.number.clone(),
            });
        }
        self.order_index
            .insert(order.number.clone(), self.orders.len());
        self.orders.push(order.clone());
        Ok(())
    }
}

/// Memory-backed storage implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
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
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    async fn create_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.logins.contains_key(&user.login) {
            return Err(StoreError::DuplicateLogin {
                login: user.login.clone(),
            });
        }
        tables.logins.insert(user.login.clone(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(user_id).cloned())
    }

    async fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .logins
            .get(login)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    async fn get_order_by_number(&self, number: &str) -> Result<Option<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .order_index
            .get(number)
            .map(|&idx| tables.orders[idx].clone()))
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&order.user_id) {
            return Err(StoreError::NotFound {
                entity: "user",
                id: order.user_id.to_string(),
            });
        }
        tables.push_order(order)
    }

    async fn list_orders_by_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_waiting_orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.is_waiting())
            .cloned()
            .collect())
    }

    // =========================================================================
    // Withdrawals
    // =========================================================================

    async fn list_withdrawals_by_user(&self, user_id: &UserId) -> Result<Vec<Withdrawal>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .withdrawals
            .iter()
            .filter(|w| &w.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn balance(&self, user_id: &UserId) -> Result<Balance> {
        let mut tables = self.tables.lock().await;
        let current = tables.user_mut(user_id)?.balance;
        let withdrawn = tables
            .withdrawals
            .iter()
            .filter(|w| &w.user_id == user_id)
            .map(|w| w.sum)
            .sum();
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
        let mut tables = self.tables.lock().await;

        let idx = *tables
            .order_index
            .get(number)
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: number.to_string(),
            })?;

        let (user_id, previous) = {
            let order = &tables.orders[idx];
            if order.status.is_terminal() {
                return Ok(AccrualOutcome::AlreadyFinal {
                    status: order.status,
                });
            }
            (order.user_id, order.accrual)
        };

        let credited = (accrual - previous).max(Decimal::ZERO);

        // Resolve the owner before writing anything so a missing user leaves
        // the order untouched.
        let balance = if credited > Decimal::ZERO {
            let user = tables.user_mut(&user_id)?;
            user.balance += credited;
            Some(user.balance)
        } else {
            None
        };

        let order = &mut tables.orders[idx];
        order.status = status;
        order.accrual = accrual;

        Ok(AccrualOutcome::Applied { credited, balance })
    }

    async fn withdraw(&self, withdrawal: &Withdrawal) -> Result<Decimal> {
        let mut tables = self.tables.lock().await;

        let user = tables.user_mut(&withdrawal.user_id)?;
        if !user.can_withdraw(withdrawal.sum) {
            return Err(StoreError::InsufficientFunds {
                balance: user.balance,
                requested: withdrawal.sum,
            });
        }

        tables.push_order(&Order::settled(
            withdrawal.order.clone(),
            withdrawal.user_id,
        ))?;
        tables.withdrawals.push(withdrawal.clone());

        let user = tables.user_mut(&withdrawal.user_id)?;
        user.balance -= withdrawal.sum;
        Ok(user.balance)
    }

    async fn reset(&self) -> Result<()> {
        *self.tables.lock().await = Tables::default();
        Ok(())
    }
}
