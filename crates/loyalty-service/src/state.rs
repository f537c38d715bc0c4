//! Application state.

use std::sync::Arc;

use loyalty_store::Store;

use crate::auth::SessionKeys;
use crate::config::ServiceConfig;
use crate::intake::OrderIntake;
use crate::withdrawals::WithdrawalService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Session token keys.
    pub sessions: SessionKeys,

    /// Order intake service.
    pub intake: OrderIntake,

    /// Withdrawal service.
    pub withdrawals: WithdrawalService,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let sessions = SessionKeys::new(config.auth_secret.as_bytes(), config.session_ttl_seconds);

        Self {
            intake: OrderIntake::new(Arc::clone(&store)),
            withdrawals: WithdrawalService::new(Arc::clone(&store)),
            store,
            config,
            sessions,
        }
    }
}
