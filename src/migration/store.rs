//! Migration storage
//!
//! In-memory store. Migrations are never removed; executed ones remain as
//! the audit history and as the baseline for later diffs.

use super::lifecycle::{LifecycleError, MigrationPhase, MigrationStatus};
use super::models::Migration;
use crate::error::{not_found_error, AppError};
use crate::execution::{ExecutionOutcome, ExecutionReporter};
use crate::schema::TableSchema;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Thread-safe migration store
pub struct MigrationStore {
    migrations: RwLock<HashMap<Uuid, Migration>>,
}

impl MigrationStore {
    pub fn new() -> Self {
        Self {
            migrations: RwLock::new(HashMap::new()),
        }
    }

    /// Stores a planned migration. If an unexecuted migration with the same
    /// checksum already exists, that one is returned instead and `false`
    /// signals nothing was added.
    pub async fn insert(&self, migration: Migration) -> (Migration, bool) {
        let mut migrations = self.migrations.write().await;
        if let Some(existing) = migrations.values().find(|m| {
            m.checksum == migration.checksum && m.status.phase() != MigrationPhase::Executed
        }) {
            return (existing.clone(), false);
        }
        migrations.insert(migration.id, migration.clone());
        (migration, true)
    }

    pub async fn get(&self, id: Uuid) -> Result<Migration, AppError> {
        let migrations = self.migrations.read().await;
        migrations
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error(format!("Migration {} not found", id)))
    }

    /// Current lifecycle timestamps, read without cloning the statements
    pub async fn status(&self, id: Uuid) -> Option<MigrationStatus> {
        self.migrations.read().await.get(&id).map(|m| m.status.clone())
    }

    /// Lists migrations oldest first, optionally filtered by phase
    pub async fn list(&self, phase: Option<MigrationPhase>) -> Vec<Migration> {
        let migrations = self.migrations.read().await;
        let mut listed: Vec<Migration> = migrations
            .values()
            .filter(|m| phase.map_or(true, |p| m.status.phase() == p))
            .cloned()
            .collect();
        listed.sort_by_key(|m| m.created_at);
        listed
    }

    pub async fn approve(&self, id: Uuid) -> Result<Migration, AppError> {
        self.update(id, |migration| {
            migration.status.approve(Utc::now().timestamp())?;
            Ok(())
        })
        .await
    }

    pub async fn record_executed(&self, id: Uuid) -> Result<Migration, AppError> {
        self.update(id, |migration| {
            migration.status.record_executed(Utc::now().timestamp())?;
            Ok(())
        })
        .await
    }

    pub async fn record_failure(&self, id: Uuid, error: String) -> Result<Migration, AppError> {
        self.update(id, |migration| {
            migration.status.record_failure(error)
        })
        .await
    }

    /// Desired schema of the most recently executed migration for a table
    pub async fn last_executed_schema(&self, database_name: &str, table_name: &str) -> Option<TableSchema> {
        let migrations = self.migrations.read().await;
        migrations
            .values()
            .filter(|m| {
                m.database_name == database_name
                    && m.table_name == table_name
                    && m.status.phase() == MigrationPhase::Executed
            })
            .max_by_key(|m| (m.status.executed_at, m.created_at))
            .and_then(|m| m.table_schema().cloned())
    }

    pub async fn count(&self) -> usize {
        self.migrations.read().await.len()
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> Result<Migration, AppError>
    where
        F: FnOnce(&mut Migration) -> Result<(), LifecycleError>,
    {
        let mut migrations = self.migrations.write().await;
        let migration = migrations
            .get_mut(&id)
            .ok_or_else(|| not_found_error(format!("Migration {} not found", id)))?;
        apply(migration)?;
        Ok(migration.clone())
    }
}

impl Default for MigrationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionReporter for MigrationStore {
    async fn report(&self, migration_id: Uuid, outcome: ExecutionOutcome) {
        let result = match outcome {
            ExecutionOutcome::Succeeded => self.record_executed(migration_id).await,
            ExecutionOutcome::Failed(error) => self.record_failure(migration_id, error).await,
        };
        match result {
            Ok(migration) => info!(
                migration_id = %migration_id,
                table = %migration.table_name,
                executed_at = migration.status.executed_at,
                error = migration.status.last_error.as_deref().unwrap_or(""),
                "Recorded execution outcome"
            ),
            Err(e) => warn!(migration_id = %migration_id, "Failed to record execution outcome: {}", e),
        }
    }
}
