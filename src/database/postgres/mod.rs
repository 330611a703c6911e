//! PostgreSQL dialect

mod alter;
mod create;
mod identifier;
mod types;

use crate::database::{PlanError, SqlDialect, TypeFamily};
use crate::diff::DdlOperation;
use crate::schema::{Extension, TableSchema};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub const fn new() -> Self {
        Self
    }
}

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn type_families(&self) -> &'static [TypeFamily] {
        types::TYPE_FAMILIES
    }

    fn type_aliases(&self) -> &'static [(&'static str, &'static str)] {
        types::TYPE_ALIASES
    }

    fn unparameterized_types(&self) -> &'static [&'static str] {
        types::UNPARAMETERIZED_TYPES
    }

    fn quote_identifier(&self, name: &str) -> String {
        identifier::quote_identifier(name)
    }

    fn quote_literal(&self, value: &str) -> String {
        identifier::quote_literal(value)
    }

    fn create_table(&self, table_name: &str, schema: &TableSchema) -> Result<String, PlanError> {
        create::create_table_statement(self, table_name, schema)
    }

    fn create_extension(&self, extension: &Extension) -> Result<String, PlanError> {
        create::create_extension_statement(extension)
    }

    fn drop_table(&self, table_name: &str) -> String {
        create::drop_table_statement(table_name)
    }

    fn render_operation(&self, table_name: &str, operation: &DdlOperation) -> Result<String, PlanError> {
        alter::render_operation(self, table_name, operation)
    }
}
