//! tokio-postgres execution driver
//!
//! Each unit runs on its own task with its own connection. All statements
//! of a migration run in one transaction.

use super::{ExecutionDriver, ExecutionError, ExecutionOutcome, ExecutionReporter, ExecutionRequest};
use crate::connection::ConnectionParams;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type RunningSet = Arc<Mutex<HashSet<Uuid>>>;

/// A claimed entry in the running set, released on drop so a unit that
/// panics does not hold its migration forever.
struct RunningSlot {
    running: RunningSet,
    migration_id: Uuid,
}

impl RunningSlot {
    fn claim(running: &RunningSet, migration_id: Uuid) -> Option<Self> {
        let inserted = running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(migration_id);
        inserted.then(|| Self {
            running: Arc::clone(running),
            migration_id,
        })
    }
}

impl Drop for RunningSlot {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.migration_id);
    }
}

pub struct PostgresExecutionDriver {
    running: RunningSet,
    reporter: Arc<dyn ExecutionReporter>,
    timeout: Duration,
}

impl PostgresExecutionDriver {
    pub fn new(reporter: Arc<dyn ExecutionReporter>, timeout: Duration) -> Self {
        Self {
            running: Arc::new(Mutex::new(HashSet::new())),
            reporter,
            timeout,
        }
    }
}

#[async_trait]
impl ExecutionDriver for PostgresExecutionDriver {
    async fn is_running(&self, migration_id: Uuid) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&migration_id)
    }

    async fn dispatch(&self, request: ExecutionRequest) -> Result<(), ExecutionError> {
        let params = ConnectionParams::from_connection_string(&request.connection_uri)
            .map_err(|e| ExecutionError::InvalidUri(e.to_string()))?;
        let mut config: Config = request
            .connection_uri
            .parse()
            .map_err(|e: tokio_postgres::Error| ExecutionError::InvalidUri(e.to_string()))?;
        config.application_name(&format!("schemaplan-{}", request.namespace));

        let slot = RunningSlot::claim(&self.running, request.migration_id)
            .ok_or(ExecutionError::AlreadyRunning(request.migration_id))?;

        info!(
            migration_id = %request.migration_id,
            target = %params.to_display_string(),
            statements = request.statements.len(),
            "Dispatching execution"
        );

        let reporter = Arc::clone(&self.reporter);
        let timeout = self.timeout;
        tokio::spawn(async move {
            let migration_id = request.migration_id;
            let start = Instant::now();

            let outcome = match tokio::time::timeout(
                timeout,
                run_statements(&config, params.use_tls, &request.statements),
            )
            .await
            {
                Ok(Ok(())) => ExecutionOutcome::Succeeded,
                Ok(Err(e)) => ExecutionOutcome::Failed(e.to_string()),
                Err(_) => ExecutionOutcome::Failed(ExecutionError::Timeout(timeout.as_secs()).to_string()),
            };

            match &outcome {
                ExecutionOutcome::Succeeded => info!(
                    migration_id = %migration_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Execution succeeded"
                ),
                ExecutionOutcome::Failed(e) => error!(migration_id = %migration_id, "Execution failed: {}", e),
            }

            // report before release: an idle migration always has its outcome recorded
            reporter.report(migration_id, outcome).await;
            drop(slot);
        });

        Ok(())
    }
}

async fn run_statements(config: &Config, use_tls: bool, statements: &[String]) -> Result<(), ExecutionError> {
    let mut client = connect(config, use_tls).await?;
    let transaction = client
        .transaction()
        .await
        .map_err(|e| ExecutionError::Connect(e.to_string()))?;

    for (index, statement) in statements.iter().enumerate() {
        debug!(index, statement = %statement, "Executing statement");
        // Rollback is automatic when the transaction is dropped
        transaction
            .batch_execute(statement)
            .await
            .map_err(|e| ExecutionError::Statement {
                index: index + 1,
                message: e.to_string(),
            })?;
    }

    transaction.commit().await.map_err(|e| ExecutionError::Statement {
        index: statements.len(),
        message: format!("commit failed: {}", e),
    })
}

async fn connect(config: &Config, use_tls: bool) -> Result<Client, ExecutionError> {
    let connect_error = |e: tokio_postgres::Error| ExecutionError::Connect(e.to_string());

    if use_tls {
        let (client, connection) = config.connect(tls_connector()).await.map_err(connect_error)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("Connection error: {}", e);
            }
        });
        Ok(client)
    } else {
        let (client, connection) = config.connect(NoTls).await.map_err(connect_error)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("Connection error: {}", e);
            }
        });
        Ok(client)
    }
}

fn tls_connector() -> tokio_postgres_rustls::MakeRustlsConnect {
    let certs = rustls_native_certs::load_native_certs();
    let mut root_store = rustls::RootCertStore::empty();
    for cert in certs.certs {
        root_store.add(cert).ok();
    }

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    tokio_postgres_rustls::MakeRustlsConnect::new(tls_config)
}
