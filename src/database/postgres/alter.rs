//! ALTER path rendering for diff operations

use super::create::{column_definition, foreign_key_constraint_clause};
use super::identifier::{quote_identifier, quote_list};
use super::PostgresDialect;
use crate::database::{PlanError, SqlDialect};
use crate::diff::DdlOperation;

pub fn render_operation(
    dialect: &PostgresDialect,
    table_name: &str,
    operation: &DdlOperation,
) -> Result<String, PlanError> {
    let table = dialect.quote_identifier(table_name);
    let alter_column =
        |column: &str| format!("alter table {table} alter column {}", quote_identifier(column));

    let sql = match operation {
        DdlOperation::CreateTable { schema } => dialect.create_table(table_name, schema)?,
        DdlOperation::DropTable => dialect.drop_table(table_name),
        DdlOperation::AddColumn { column } => {
            format!("alter table {table} add column {}", column_definition(dialect, column)?)
        }
        DdlOperation::DropColumn { column } => {
            format!("alter table {table} drop column {}", quote_identifier(column))
        }
        DdlOperation::AlterColumnType { column, data_type } => {
            format!("{} type {data_type}", alter_column(column))
        }
        DdlOperation::SetNotNull { column } => format!("{} set not null", alter_column(column)),
        DdlOperation::DropNotNull { column } => format!("{} drop not null", alter_column(column)),
        DdlOperation::SetDefault { column, value } => {
            format!("{} set default {}", alter_column(column), dialect.quote_literal(value))
        }
        DdlOperation::DropDefault { column } => format!("{} drop default", alter_column(column)),
        DdlOperation::AddPrimaryKey { columns } => {
            format!("alter table {table} add primary key ({})", quote_list(columns))
        }
        DdlOperation::DropConstraint { name } => {
            format!("alter table {table} drop constraint {}", quote_identifier(name))
        }
        DdlOperation::AddUniqueConstraint { name, columns } => format!(
            "alter table {table} add constraint {} unique ({})",
            quote_identifier(name),
            quote_list(columns)
        ),
        DdlOperation::CreateIndex { index } => {
            let using = index
                .access_method()
                .map(|method| format!(" using {method}"))
                .unwrap_or_default();
            format!(
                "create {}index {} on {table}{using} ({})",
                if index.is_unique { "unique " } else { "" },
                quote_identifier(&index.index_name(table_name)),
                quote_list(&index.columns)
            )
        }
        DdlOperation::DropIndex { name } => format!("drop index {}", quote_identifier(name)),
        DdlOperation::AddForeignKey { foreign_key } => format!(
            "alter table {table} add {}",
            foreign_key_constraint_clause(table_name, foreign_key)
        ),
    };

    Ok(sql)
}
