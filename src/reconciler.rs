//! Reconciliation of migrations
//!
//! Level-triggered: every tick observes each migration and acts only on its
//! current timestamps, so a missed or repeated tick changes nothing.

use crate::connection::{ConnectionError, ConnectionResolver};
use crate::execution::{ExecutionDriver, ExecutionError, ExecutionRequest};
use crate::migration::{LifecycleAction, Migration, MigrationPhase, MigrationStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("failed to get connection uri: {0}")]
    ConnectionUri(#[source] ConnectionError),

    #[error("failed to dispatch execution: {0}")]
    Dispatch(#[source] ExecutionError),

    #[error("migration {0} is not in the store")]
    UnknownMigration(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileOutcome {
    /// Not approved yet
    Waiting,
    /// An execution unit for this migration is still in flight
    AlreadyRunning,
    Dispatched,
    Complete,
}

pub struct Reconciler {
    store: Arc<MigrationStore>,
    resolver: Arc<dyn ConnectionResolver>,
    driver: Arc<dyn ExecutionDriver>,
    /// Held from the running check through dispatch
    dispatch_gate: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        store: Arc<MigrationStore>,
        resolver: Arc<dyn ConnectionResolver>,
        driver: Arc<dyn ExecutionDriver>,
    ) -> Self {
        Self {
            store,
            resolver,
            driver,
            dispatch_gate: Mutex::new(()),
        }
    }

    /// Applies the lifecycle rule to one observation of a migration.
    ///
    /// The observation may be stale, so the stored status is read again once
    /// the driver reports no unit in flight.
    pub async fn reconcile(&self, migration: &Migration) -> Result<ReconcileOutcome, ReconcileError> {
        match migration.status.next_action() {
            LifecycleAction::Wait => return Ok(ReconcileOutcome::Waiting),
            LifecycleAction::Done => return Ok(ReconcileOutcome::Complete),
            LifecycleAction::Execute => {}
        }

        let _gate = self.dispatch_gate.lock().await;

        if self.driver.is_running(migration.id).await {
            debug!(migration_id = %migration.id, "Execution already running");
            return Ok(ReconcileOutcome::AlreadyRunning);
        }

        let status = self
            .store
            .status(migration.id)
            .await
            .ok_or(ReconcileError::UnknownMigration(migration.id))?;
        match status.next_action() {
            LifecycleAction::Wait => return Ok(ReconcileOutcome::Waiting),
            LifecycleAction::Done => {
                debug!(migration_id = %migration.id, "Execution finished since observation");
                return Ok(ReconcileOutcome::Complete);
            }
            LifecycleAction::Execute => {}
        }

        let connection_uri = self
            .resolver
            .resolve(&migration.database_name)
            .await
            .map_err(ReconcileError::ConnectionUri)?;

        let request = ExecutionRequest {
            migration_id: migration.id,
            connection_uri,
            namespace: migration.database_name.clone(),
            statements: migration.statements.clone(),
        };

        match self.driver.dispatch(request).await {
            Ok(()) => Ok(ReconcileOutcome::Dispatched),
            Err(ExecutionError::AlreadyRunning(_)) => Ok(ReconcileOutcome::AlreadyRunning),
            Err(e) => Err(ReconcileError::Dispatch(e)),
        }
    }

    /// Reconciles every approved, unexecuted migration once, oldest first.
    /// Errors are logged and left for the next pass.
    pub async fn reconcile_all(&self) -> usize {
        let mut dispatched = 0;
        for migration in self.store.list(Some(MigrationPhase::Approved)).await {
            match self.reconcile(&migration).await {
                Ok(ReconcileOutcome::Dispatched) => dispatched += 1,
                Ok(_) => {}
                Err(e) => warn!(
                    migration_id = %migration.id,
                    database = %migration.database_name,
                    "Reconcile failed: {}",
                    e
                ),
            }
        }
        dispatched
    }

    /// Runs `reconcile_all` every `interval` until `shutdown` flips.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "Reconcile loop started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let dispatched = self.reconcile_all().await;
                    if dispatched > 0 {
                        info!(dispatched, "Reconcile pass dispatched executions");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reconcile loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{ExecutionOutcome, ExecutionReporter};
    use crate::migration::MigrationSpec;
    use crate::schema::Extension;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct FakeResolver {
        fail: bool,
    }

    #[async_trait]
    impl ConnectionResolver for FakeResolver {
        async fn resolve(&self, database_name: &str) -> Result<String, ConnectionError> {
            if self.fail {
                return Err(ConnectionError::UnknownDatabase(database_name.to_string()));
            }
            Ok(format!("postgres://u:p@localhost/{database_name}"))
        }
    }

    /// Units stay running until the test says otherwise.
    #[derive(Default)]
    struct FakeDriver {
        running: Mutex<HashSet<Uuid>>,
        dispatched: Mutex<Vec<ExecutionRequest>>,
        reject: bool,
    }

    #[async_trait]
    impl ExecutionDriver for FakeDriver {
        async fn is_running(&self, migration_id: Uuid) -> bool {
            self.running.lock().await.contains(&migration_id)
        }

        async fn dispatch(&self, request: ExecutionRequest) -> Result<(), ExecutionError> {
            if self.reject {
                return Err(ExecutionError::Connect("refused".to_string()));
            }
            self.running.lock().await.insert(request.migration_id);
            self.dispatched.lock().await.push(request);
            Ok(())
        }
    }

    fn migration(name: &str) -> Migration {
        Migration::new(
            "app",
            name,
            MigrationSpec::Extension {
                extension: Extension::new(name),
            },
            vec![format!(r#"create extension "{name}" if not exists"#)],
        )
    }

    struct Fixture {
        store: Arc<MigrationStore>,
        driver: Arc<FakeDriver>,
        reconciler: Reconciler,
    }

    fn fixture(driver: FakeDriver, fail_resolve: bool) -> Fixture {
        let store = Arc::new(MigrationStore::new());
        let driver = Arc::new(driver);
        let resolver = Arc::new(FakeResolver { fail: fail_resolve });
        let reconciler = Reconciler::new(store.clone(), resolver, driver.clone());
        Fixture {
            store,
            driver,
            reconciler,
        }
    }

    async fn approved(store: &MigrationStore, name: &str) -> Migration {
        let (migration, _) = store.insert(migration(name)).await;
        store.approve(migration.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_unapproved_migration_waits() {
        let f = fixture(FakeDriver::default(), false);
        let (pending, _) = f.store.insert(migration("citext")).await;

        let outcome = f.reconciler.reconcile(&pending).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Waiting);
        assert!(f.driver.dispatched.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_approved_migration_dispatches_once() {
        let f = fixture(FakeDriver::default(), false);
        let migration = approved(&f.store, "citext").await;

        assert_eq!(f.reconciler.reconcile(&migration).await.unwrap(), ReconcileOutcome::Dispatched);
        assert_eq!(f.reconciler.reconcile(&migration).await.unwrap(), ReconcileOutcome::AlreadyRunning);

        let dispatched = f.driver.dispatched.lock().await;
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].migration_id, migration.id);
        assert_eq!(dispatched[0].namespace, "app");
        assert_eq!(dispatched[0].connection_uri, "postgres://u:p@localhost/app");
        assert_eq!(dispatched[0].statements, migration.statements);
    }

    #[tokio::test]
    async fn test_executed_migration_is_complete() {
        let f = fixture(FakeDriver::default(), false);
        let migration = approved(&f.store, "citext").await;
        let executed = f.store.record_executed(migration.id).await.unwrap();

        let outcome = f.reconciler.reconcile(&executed).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Complete);
        assert!(f.driver.dispatched.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_observation_of_finished_execution_is_not_redispatched() {
        let f = fixture(FakeDriver::default(), false);
        approved(&f.store, "citext").await;

        let snapshot = f.store.list(Some(MigrationPhase::Approved)).await.remove(0);
        // the unit finishes and releases its slot after the snapshot was taken
        f.store.report(snapshot.id, ExecutionOutcome::Succeeded).await;
        assert!(!f.driver.is_running(snapshot.id).await);

        let outcome = f.reconciler.reconcile(&snapshot).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Complete);
        assert!(f.driver.dispatched.lock().await.is_empty());

        f.store.report(snapshot.id, ExecutionOutcome::Failed("relation \"t\" already exists".to_string())).await;
        let stored = f.store.get(snapshot.id).await.unwrap();
        assert_eq!(stored.status.phase(), MigrationPhase::Executed);
        assert_eq!(stored.status.last_error, None);
    }

    #[tokio::test]
    async fn test_migration_missing_from_store() {
        let f = fixture(FakeDriver::default(), false);
        let mut migration = migration("citext");
        migration.status.approve(100).unwrap();

        let err = f.reconciler.reconcile(&migration).await.unwrap_err();
        assert_eq!(err, ReconcileError::UnknownMigration(migration.id));
        assert!(f.driver.dispatched.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_resolution_error_is_wrapped() {
        let f = fixture(FakeDriver::default(), true);
        let migration = approved(&f.store, "citext").await;

        let err = f.reconciler.reconcile(&migration).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to get connection uri"));
        assert!(f.driver.dispatched.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_error_is_wrapped() {
        let driver = FakeDriver {
            reject: true,
            ..Default::default()
        };
        let f = fixture(driver, false);
        let migration = approved(&f.store, "citext").await;

        let err = f.reconciler.reconcile(&migration).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to dispatch execution: failed to connect: refused");
    }

    #[tokio::test]
    async fn test_reconcile_all_only_touches_approved() {
        let f = fixture(FakeDriver::default(), false);
        let (pending, _) = f.store.insert(migration("citext")).await;
        let approved = approved(&f.store, "hstore").await;

        assert_eq!(f.reconciler.reconcile_all().await, 1);
        assert_eq!(f.reconciler.reconcile_all().await, 0);

        let dispatched = f.driver.dispatched.lock().await;
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].migration_id, approved.id);
        assert_ne!(dispatched[0].migration_id, pending.id);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let reconciler = Arc::new(fixture(FakeDriver::default(), false).reconciler);
        let handle = tokio::spawn(reconciler.run(Duration::from_millis(10), rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
