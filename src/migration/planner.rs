//! Migration planning
//!
//! Turns desired state into a Migration holding the generated statements.

use super::models::{Migration, MigrationSpec};
use crate::database::{PlanError, SqlDialect};
use crate::diff;
use crate::schema::{Extension, TableSchema};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct MigrationPlanner {
    dialect: Arc<dyn SqlDialect>,
}

impl MigrationPlanner {
    pub fn new(dialect: Arc<dyn SqlDialect>) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// Plans the change from `previous` (absent: the table does not exist)
    /// to `schema`. Returns `None` when the two already agree.
    pub fn plan_table(
        &self,
        database_name: &str,
        table_name: &str,
        schema: TableSchema,
        previous: Option<TableSchema>,
    ) -> Result<Option<Migration>, PlanError> {
        if !schema.is_deleted {
            schema.validate(table_name).map_err(|source| PlanError::Schema {
                table: table_name.to_string(),
                source,
            })?;
        }

        let operations = diff::diff(self.dialect(), table_name, previous.as_ref(), &schema)?;
        if operations.is_empty() {
            debug!(database = database_name, table = table_name, "Table already matches desired schema");
            return Ok(None);
        }

        let statements = diff::render(self.dialect(), table_name, &operations)?;
        debug!(
            database = database_name,
            table = table_name,
            statements = statements.len(),
            dialect = self.dialect.name(),
            "Planned table migration"
        );

        Ok(Some(Migration::new(
            database_name,
            table_name,
            MigrationSpec::Table { schema, previous },
            statements,
        )))
    }

    pub fn plan_extension(&self, database_name: &str, extension: Extension) -> Result<Migration, PlanError> {
        let statement = self.dialect.create_extension(&extension)?;
        Ok(Migration::new(
            database_name,
            extension.name.clone(),
            MigrationSpec::Extension { extension },
            vec![statement],
        ))
    }
}
