//! Migration data model

use super::lifecycle::MigrationStatus;
use crate::schema::{Extension, TableSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Desired-state payload a migration was planned from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MigrationSpec {
    #[serde(rename_all = "camelCase")]
    Table {
        schema: TableSchema,
        /// Shape the statements were diffed against; absent for a create
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<TableSchema>,
    },
    Extension { extension: Extension },
}

/// One planned, approvable, executable schema change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    pub id: Uuid,
    /// Target database, resolved to a connection URI at execution time
    pub database_name: String,
    /// Target table, or the extension name for extension migrations
    pub table_name: String,
    pub spec: MigrationSpec,
    /// Generated DDL, executed in order
    pub statements: Vec<String>,
    pub checksum: String,
    pub status: MigrationStatus,
    pub created_at: DateTime<Utc>,
}

impl Migration {
    pub fn new(
        database_name: impl Into<String>,
        table_name: impl Into<String>,
        spec: MigrationSpec,
        statements: Vec<String>,
    ) -> Self {
        let database_name = database_name.into();
        let checksum = Self::compute_checksum(&database_name, &statements);
        Self {
            id: Uuid::new_v4(),
            database_name,
            table_name: table_name.into(),
            spec,
            statements,
            checksum,
            status: MigrationStatus::default(),
            created_at: Utc::now(),
        }
    }

    /// sha256 over the target database and the statements
    pub fn compute_checksum(database_name: &str, statements: &[String]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(database_name.as_bytes());
        for statement in statements {
            hasher.update(b"\n");
            hasher.update(statement.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// The desired table schema, if this is a table migration
    pub fn table_schema(&self) -> Option<&TableSchema> {
        match &self.spec {
            MigrationSpec::Table { schema, .. } => Some(schema),
            MigrationSpec::Extension { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_depends_on_database_and_statements() {
        let statements = vec!["create extension \"citext\" if not exists".to_string()];
        let a = Migration::compute_checksum("app", &statements);
        assert_eq!(a, Migration::compute_checksum("app", &statements));
        assert_ne!(a, Migration::compute_checksum("analytics", &statements));
        assert_ne!(a, Migration::compute_checksum("app", &[]));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_serializes_status_timestamps() {
        let migration = Migration::new(
            "app",
            "citext",
            MigrationSpec::Extension {
                extension: Extension::new("citext"),
            },
            vec![],
        );
        let value = serde_json::to_value(&migration).unwrap();
        assert_eq!(value["status"]["approvedAt"], 0);
        assert_eq!(value["status"]["executedAt"], 0);
        assert_eq!(value["spec"]["kind"], "extension");
    }
}
