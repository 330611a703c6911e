//! Execution of approved migrations
//!
//! A driver runs one migration's statements as an isolated unit and reports
//! the outcome back asynchronously. Dispatch returns as soon as the unit is
//! started.

mod postgres;

pub use postgres::PostgresExecutionDriver;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("invalid connection uri: {0}")]
    InvalidUri(String),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("statement {index} failed: {message}")]
    Statement { index: usize, message: String },

    #[error("execution timed out after {0}s")]
    Timeout(u64),

    #[error("migration {0} already has a running execution")]
    AlreadyRunning(Uuid),
}

/// Everything an execution unit needs
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub migration_id: Uuid,
    pub connection_uri: String,
    /// Target database name; labels the unit (Postgres `application_name`)
    pub namespace: String,
    pub statements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    Failed(String),
}

#[async_trait]
pub trait ExecutionDriver: Send + Sync {
    /// Whether a unit for this migration is still in flight
    async fn is_running(&self, migration_id: Uuid) -> bool;

    /// Starts a unit. Errors only when the unit could not be started.
    async fn dispatch(&self, request: ExecutionRequest) -> Result<(), ExecutionError>;
}

/// Receives unit outcomes
#[async_trait]
pub trait ExecutionReporter: Send + Sync {
    async fn report(&self, migration_id: Uuid, outcome: ExecutionOutcome);
}
