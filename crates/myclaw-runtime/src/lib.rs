//! # myclaw-runtime
//!
//! The agent runtime: event bus, session store, turn engine, interrupt
//! queue, persistence, and the production subscribers. No process-wide
//! singletons — a [`Runtime`] bundles the explicit handles and is threaded
//! through all entry points.

#![deny(unsafe_code)]

pub mod bus;
pub mod compression;
pub mod context;
pub mod dispatch;
pub mod errors;
pub mod factory;
pub mod interrupts;
pub mod oscillation;
pub mod persistence;
pub mod session;
pub mod store;
pub mod subscribers;
pub mod turn;

use std::sync::Arc;

use uuid::Uuid;

pub use bus::EventBus;
pub use dispatch::ApprovalHandler;
pub use errors::{Result, RuntimeError};
pub use interrupts::InterruptQueue;
pub use persistence::{list_for_workspace, pick_session, PersistedSessionSummary};
pub use store::SessionStore;

use myclaw_settings::Config;
use subscribers::checks::AsyncCheckSubscriber;
use subscribers::metrics::MetricsSubscriber;
use subscribers::profile::UserProfileSubscriber;
use subscribers::session_log::SessionLogSubscriber;

/// The assembled runtime: configuration, store, bus, and the production
/// subscribers.
pub struct Runtime {
    /// Effective configuration.
    pub config: Config,
    /// Session store.
    pub store: Arc<SessionStore>,
    /// Event bus.
    pub bus: EventBus,
    session_log: SessionLogSubscriber,
    metrics: MetricsSubscriber,
    checks: AsyncCheckSubscriber,
    profile: UserProfileSubscriber,
}

impl Runtime {
    /// Assemble a runtime and attach the production subscribers.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let store = Arc::new(SessionStore::new());
        let bus = EventBus::new();
        let session_log = SessionLogSubscriber::attach(&bus);
        let metrics = MetricsSubscriber::attach(&bus, config.metrics_dir());
        let checks = AsyncCheckSubscriber::attach(
            &bus,
            store.clone(),
            config.runtime.checks.eslint.enabled,
            config.review.clone(),
        );
        let profile = UserProfileSubscriber::attach(&bus, config.profile_path());
        Self {
            config,
            store,
            bus,
            session_log,
            metrics,
            checks,
            profile,
        }
    }

    /// Create a session from the configuration.
    pub fn create_session(&self) -> Result<Uuid> {
        self.store.create_session(&self.config, &self.bus)
    }

    /// Restore a persisted session by ID.
    pub fn resume(&self, session_id: &str) -> Result<Uuid> {
        persistence::resume(&self.store, &self.config, &self.bus, session_id)
    }

    /// Run one turn and return the final assistant text.
    pub async fn run_turn(
        &self,
        session_id: Uuid,
        input: &str,
        approval: Option<&dyn ApprovalHandler>,
    ) -> Result<String> {
        turn::run_turn(&self.store, session_id, input, &self.bus, approval).await
    }

    /// Close a session.
    pub fn close_session(&self, session_id: Uuid) -> Result<()> {
        self.store.close_session(session_id, &self.bus)
    }

    /// Await all subscriber queues. Call before process exit.
    pub async fn flush(&self) {
        self.session_log.flush().await;
        self.metrics.flush().await;
        self.checks.flush().await;
        self.profile.flush().await;
    }
}
