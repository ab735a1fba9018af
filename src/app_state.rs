//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::domain::Registry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The process-wide subscription registry.
    pub registry: Arc<Registry>,
    /// Settings applied to every new session.
    pub session: SessionConfig,
}

impl AppState {
    /// Builds the state with a fresh registry configured from `session`.
    #[must_use]
    pub fn new(session: SessionConfig) -> Self {
        Self {
            registry: Arc::new(Registry::with_drop_limit(
                session.slow_subscriber_drop_limit,
            )),
            session,
        }
    }
}
