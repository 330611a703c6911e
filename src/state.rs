//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::config::Settings;
use crate::connection::{ConnectionError, RegistryConnectionResolver};
use crate::database::PostgresDialect;
use crate::execution::PostgresExecutionDriver;
use crate::migration::{MigrationPlanner, MigrationStore};
use crate::reconciler::Reconciler;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Every planned migration, executed ones included
    pub migrations: Arc<MigrationStore>,

    /// Turns desired state into migrations
    pub planner: MigrationPlanner,

    /// Shared with the background reconcile loop
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    /// Wires the Postgres dialect, the registry resolver and the
    /// tokio-postgres driver, which reports back into the store.
    pub fn new(settings: &Settings) -> Result<Self, ConnectionError> {
        let migrations = Arc::new(MigrationStore::new());
        let resolver = RegistryConnectionResolver::new(settings.databases.clone())?;
        let driver = PostgresExecutionDriver::new(migrations.clone(), settings.reconciler.execution_timeout);

        Ok(Self::with_components(
            migrations.clone(),
            MigrationPlanner::new(Arc::new(PostgresDialect::new())),
            Arc::new(Reconciler::new(migrations, Arc::new(resolver), Arc::new(driver))),
        ))
    }

    pub fn with_components(
        migrations: Arc<MigrationStore>,
        planner: MigrationPlanner,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            migrations,
            planner,
            reconciler,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
