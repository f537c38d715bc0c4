//! Accrual reconciler.
//!
//! A single background task that repeatedly sweeps every order still waiting
//! for an accrual decision, asks the accrual service about each one in turn,
//! and writes the answer back through the store.
//!
//! # Scheduling
//!
//! Passes never overlap: the next pass is only scheduled once the current one
//! has finished. The delay before the next pass is the default interval,
//! unless the accrual service rate limited us, in which case the pass is cut
//! short and the delay is whatever the service asked for.
//!
//! # Failure handling
//!
//! A failure on one order (transport, 500, malformed body, storage) is logged
//! and the pass moves on. The order keeps its status and is polled again on
//! the next pass. Failing to list the waiting orders skips the whole pass.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use loyalty_accrual::{AccrualClient, AccrualDecision, AccrualReply};
use loyalty_core::Order;
use loyalty_store::{AccrualOutcome, Store};

/// Delay between passes when nothing asks for longer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Reconciler tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    /// Delay between passes, and the fallback wait when the accrual service
    /// rate limits without saying for how long.
    pub default_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            default_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Orders the accrual service was asked about.
    pub polled: usize,
    /// Decisions written to the store.
    pub applied: usize,
    /// Orders the service does not know yet.
    pub unknown: usize,
    /// Orders that failed (service or storage).
    pub failed: usize,
    /// Set when the pass was cut short by rate limiting: how long to wait
    /// before polling anything again.
    pub backoff: Option<Duration>,
}

impl PassOutcome {
    /// Whether the pass ended early because of rate limiting.
    #[must_use]
    pub fn was_rate_limited(&self) -> bool {
        self.backoff.is_some()
    }
}

/// The accrual reconciler.
pub struct Reconciler {
    store: Arc<dyn Store>,
    client: AccrualClient,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, client: AccrualClient, config: ReconcilerConfig) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    /// Run passes until `shutdown` is cancelled.
    ///
    /// Cancellation may abandon a pass between or during accrual requests;
    /// every store write is a single atomic operation, so nothing is left
    /// half-applied.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            accrual_url = %self.client.base_url(),
            interval = ?self.config.default_interval,
            "Reconciler started"
        );

        loop {
            let delay = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                outcome = self.run_pass() => self.next_delay(&outcome),
            };

            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Reconciler stopped");
    }

    /// Delay before the pass after one that ended with `outcome`.
    #[must_use]
    pub fn next_delay(&self, outcome: &PassOutcome) -> Duration {
        outcome.backoff.unwrap_or(self.config.default_interval)
    }

    /// Run a single pass over every waiting order.
    pub async fn run_pass(&self) -> PassOutcome {
        let mut outcome = PassOutcome::default();

        let orders = match self.store.list_waiting_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list waiting orders; skipping pass");
                return outcome;
            }
        };

        if orders.is_empty() {
            return outcome;
        }
        tracing::debug!(count = orders.len(), "Reconciliation pass started");

        for order in &orders {
            outcome.polled += 1;

            match self.client.fetch(&order.number).await {
                Ok(AccrualReply::Decision(decision)) => {
                    if self.apply(order, &decision).await {
                        outcome.applied += 1;
                    } else {
                        outcome.failed += 1;
                    }
                }
                Ok(AccrualReply::Unknown) => {
                    tracing::debug!(order = %order.number, "Order not yet known to accrual service");
                    outcome.unknown += 1;
                }
                Ok(AccrualReply::Overloaded { retry_after }) => {
                    let wait = retry_after.unwrap_or(self.config.default_interval);
                    tracing::warn!(
                        order = %order.number,
                        wait_secs = wait.as_secs(),
                        remaining = orders.len() - outcome.polled,
                        "Accrual service rate limited; ending pass early"
                    );
                    outcome.backoff = Some(wait);
                    break;
                }
                Err(e) => {
                    tracing::warn!(order = %order.number, error = %e, "Accrual lookup failed");
                    outcome.failed += 1;
                }
            }
        }

        tracing::debug!(
            polled = outcome.polled,
            applied = outcome.applied,
            unknown = outcome.unknown,
            failed = outcome.failed,
            rate_limited = outcome.was_rate_limited(),
            "Reconciliation pass finished"
        );
        outcome
    }

    /// Write one decision back. Returns `false` if the write failed.
    async fn apply(&self, order: &Order, decision: &AccrualDecision) -> bool {
        if decision.order != order.number {
            tracing::warn!(
                order = %order.number,
                reported = %decision.order,
                "Accrual service answered for a different order number"
            );
        }

        match self
            .store
            .apply_accrual(&order.number, decision.status, decision.accrual)
            .await
        {
            Ok(AccrualOutcome::Applied { credited, balance }) => {
                if credited > Decimal::ZERO {
                    tracing::info!(
                        order = %order.number,
                        user_id = %order.user_id,
                        status = %decision.status,
                        credited = %credited,
                        balance = ?balance,
                        "Accrual credited"
                    );
                } else if decision.status != order.status {
                    tracing::debug!(
                        order = %order.number,
                        from = %order.status,
                        to = %decision.status,
                        "Order status updated"
                    );
                }
                true
            }
            Ok(AccrualOutcome::AlreadyFinal { status }) => {
                tracing::warn!(
                    order = %order.number,
                    status = %status,
                    "Order settled concurrently; decision ignored"
                );
                true
            }
            Err(e) => {
                tracing::error!(order = %order.number, error = %e, "Failed to apply accrual decision");
                false
            }
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("client", &self.client)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_three_seconds() {
        assert_eq!(
            ReconcilerConfig::default().default_interval,
            Duration::from_secs(3)
        );
    }

    #[test]
    fn backoff_replaces_default_delay_once() {
        let store: Arc<dyn Store> = Arc::new(loyalty_store::MemoryStore::new());
        let client = AccrualClient::new("http://localhost:1", Duration::from_secs(1)).unwrap();
        let reconciler = Reconciler::new(store, client, ReconcilerConfig::default());

        let limited = PassOutcome {
            backoff: Some(Duration::from_secs(60)),
            ..PassOutcome::default()
        };
        assert_eq!(reconciler.next_delay(&limited), Duration::from_secs(60));
        assert_eq!(
            reconciler.next_delay(&PassOutcome::default()),
            DEFAULT_POLL_INTERVAL
        );
    }
}
