//! Order intake.
//!
//! Validates a submitted order number and records it for the caller. A
//! number belongs to the first user who submits it, forever.

use std::sync::Arc;

use loyalty_core::{Order, OrderNumber, OrderNumberError, UserId};
use loyalty_store::{Store, StoreError};

/// Why an order could not be taken in.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The number is empty, not numeric, or fails the checksum.
    #[error(transparent)]
    Invalid(#[from] OrderNumberError),

    /// Another user already owns the number.
    #[error("order {number} belongs to another user")]
    Conflict {
        /// The contested number.
        number: String,
    },

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Successful intake result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// A new order was recorded in `NEW`.
    Accepted(Order),
    /// The caller had already submitted this number; nothing changed.
    AlreadyOwned(Order),
}

/// Order intake service.
#[derive(Clone)]
pub struct OrderIntake {
    store: Arc<dyn Store>,
}

impl OrderIntake {
    /// Create an intake service over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Submit an order number on behalf of `user_id`.
    ///
    /// Surrounding whitespace is ignored.
    pub async fn submit(&self, user_id: UserId, raw: &str) -> Result<IntakeOutcome, IntakeError> {
        let number = OrderNumber::parse(raw.trim())?;

        if let Some(existing) = self.store.get_order_by_number(number.as_str()).await? {
            return Self::resolve_existing(existing, user_id);
        }

        let order = Order::new(number, user_id);
        match self.store.insert_order(&order).await {
            Ok(()) => {
                tracing::info!(order = %order.number, user_id = %user_id, "Order accepted");
                Ok(IntakeOutcome::Accepted(order))
            }
            // A concurrent submission claimed the number between lookup and insert.
            Err(StoreError::OrderConflict { number }) => {
                let existing = self
                    .store
                    .get_order_by_number(&number)
                    .await?
                    .ok_or(IntakeError::Conflict { number })?;
                Self::resolve_existing(existing, user_id)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_existing(existing: Order, user_id: UserId) -> Result<IntakeOutcome, IntakeError> {
        if existing.user_id == user_id {
            tracing::debug!(order = %existing.number, "Order already submitted by this user");
            Ok(IntakeOutcome::AlreadyOwned(existing))
        } else {
            tracing::info!(
                order = %existing.number,
                user_id = %user_id,
                owner = %existing.user_id,
                "Order number claimed by another user"
            );
            Err(IntakeError::Conflict {
                number: existing.number,
            })
        }
    }
}

impl std::fmt::Debug for OrderIntake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderIntake").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loyalty_core::{OrderStatus, User};
    use loyalty_store::MemoryStore;

    async fn setup() -> (Arc<MemoryStore>, OrderIntake, User, User) {
        let store = Arc::new(MemoryStore::new());
        let alice = User::new("alice", "hash");
        let bob = User::new("bob", "hash");
        store.create_user(&alice).await.unwrap();
        store.create_user(&bob).await.unwrap();
        let intake = OrderIntake::new(store.clone());
        (store, intake, alice, bob)
    }

    #[tokio::test]
    async fn first_submission_is_accepted_as_new() {
        let (store, intake, alice, _) = setup().await;

        let outcome = intake.submit(alice.id, "3182649").await.unwrap();
        let IntakeOutcome::Accepted(order) = outcome else {
            panic!("expected acceptance");
        };
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(store.list_orders_by_user(&alice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resubmission_by_owner_is_harmless() {
        let (store, intake, alice, _) = setup().await;

        intake.submit(alice.id, "3182649").await.unwrap();
        let outcome = intake.submit(alice.id, "3182649").await.unwrap();
        assert!(matches!(outcome, IntakeOutcome::AlreadyOwned(_)));
        assert_eq!(store.list_orders_by_user(&alice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn submission_by_other_user_conflicts() {
        let (store, intake, alice, bob) = setup().await;

        intake.submit(bob.id, "3182649").await.unwrap();
        let result = intake.submit(alice.id, "3182649").await;
        assert!(matches!(result, Err(IntakeError::Conflict { .. })));

        let order = store.get_order_by_number("3182649").await.unwrap().unwrap();
        assert_eq!(order.user_id, bob.id);
    }

    #[tokio::test]
    async fn whitespace_is_trimmed() {
        let (_, intake, alice, _) = setup().await;

        let outcome = intake.submit(alice.id, "  3182649\n").await.unwrap();
        let IntakeOutcome::Accepted(order) = outcome else {
            panic!("expected acceptance");
        };
        assert_eq!(order.number, "3182649");
    }

    #[tokio::test]
    async fn invalid_numbers_are_rejected() {
        let (_, intake, alice, _) = setup().await;

        assert!(matches!(
            intake.submit(alice.id, "11111111").await,
            Err(IntakeError::Invalid(OrderNumberError::Checksum))
        ));
        assert!(matches!(
            intake.submit(alice.id, "12a4").await,
            Err(IntakeError::Invalid(OrderNumberError::NonDigit))
        ));
        assert!(matches!(
            intake.submit(alice.id, "   ").await,
            Err(IntakeError::Invalid(OrderNumberError::Empty))
        ));
    }
}
