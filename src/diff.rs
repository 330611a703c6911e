//! Schema diff planner
//!
//! Compares the last applied shape of a table with the desired one and
//! produces an ordered list of DDL operations. Pure: nothing here reads a
//! live database, so "actual" is whatever shape the caller trusts as
//! current (typically the schema of the last executed migration).

use crate::database::{PlanError, SqlDialect};
use crate::schema::{Column, ForeignKey, Index, TableSchema};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One schema change, rendered to SQL by a dialect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum DdlOperation {
    CreateTable { schema: TableSchema },
    DropTable,
    AddColumn { column: Column },
    DropColumn { column: String },
    AlterColumnType { column: String, data_type: String },
    SetNotNull { column: String },
    DropNotNull { column: String },
    SetDefault { column: String, value: String },
    DropDefault { column: String },
    AddPrimaryKey { columns: Vec<String> },
    DropConstraint { name: String },
    AddUniqueConstraint { name: String, columns: Vec<String> },
    CreateIndex { index: Index },
    DropIndex { name: String },
    AddForeignKey { foreign_key: ForeignKey },
}

/// Postgres names an unnamed primary key `<table>_pkey`.
pub fn primary_key_constraint_name(table_name: &str) -> String {
    format!("{table_name}_pkey")
}

/// Plans the operations that take `actual` to `desired`.
///
/// Constraint drops come first so the columns they cover can be altered or
/// removed; constraint additions come last.
pub fn diff(
    dialect: &dyn SqlDialect,
    table_name: &str,
    actual: Option<&TableSchema>,
    desired: &TableSchema,
) -> Result<Vec<DdlOperation>, PlanError> {
    let Some(actual) = actual else {
        if desired.is_deleted {
            return Ok(Vec::new());
        }
        return Ok(vec![DdlOperation::CreateTable {
            schema: desired.clone(),
        }]);
    };

    if desired.is_deleted {
        return Ok(vec![DdlOperation::DropTable]);
    }

    // Foreign keys go first, then standalone indexes, then table constraints.
    let mut fk_drops = Vec::new();
    let mut index_drops = Vec::new();
    let mut constraint_drops = Vec::new();
    let mut columns = Vec::new();
    let mut additions = Vec::new();

    // Foreign keys
    let actual_fks = keyed(&actual.foreign_keys, |fk| fk.constraint_name(table_name));
    let desired_fks = keyed(&desired.foreign_keys, |fk| fk.constraint_name(table_name));
    for (name, fk) in &actual_fks {
        if desired_fks.get(name) != Some(fk) {
            fk_drops.push(name.clone());
        }
    }
    for fk in &desired.foreign_keys {
        let name = fk.constraint_name(table_name);
        if actual_fks.get(&name) != Some(&fk) {
            additions.push(DdlOperation::AddForeignKey {
                foreign_key: fk.clone(),
            });
        }
    }

    // Primary key
    if actual.primary_key != desired.primary_key {
        if !actual.primary_key.is_empty() {
            constraint_drops.push(primary_key_constraint_name(table_name));
        }
        if !desired.primary_key.is_empty() {
            additions.insert(
                0,
                DdlOperation::AddPrimaryKey {
                    columns: desired.primary_key.clone(),
                },
            );
        }
    }

    // Indexes: unique ones live as table constraints, the rest as standalone indexes
    let actual_indexes = keyed(&actual.indexes, |index| index.index_name(table_name));
    let desired_indexes = keyed(&desired.indexes, |index| index.index_name(table_name));
    for (name, index) in &actual_indexes {
        if desired_indexes.get(name) == Some(index) {
            continue;
        }
        if index.is_unique {
            constraint_drops.push(name.clone());
        } else {
            index_drops.push(name.clone());
        }
    }
    let mut index_additions = Vec::new();
    for index in &desired.indexes {
        let name = index.index_name(table_name);
        if actual_indexes.get(&name) == Some(&index) {
            continue;
        }
        index_additions.push(if index.is_unique {
            DdlOperation::AddUniqueConstraint {
                name,
                columns: index.columns.clone(),
            }
        } else {
            DdlOperation::CreateIndex {
                index: index.clone(),
            }
        });
    }
    let fk_start = additions
        .iter()
        .position(|op| matches!(op, DdlOperation::AddForeignKey { .. }))
        .unwrap_or(additions.len());
    additions.splice(fk_start..fk_start, index_additions);

    // Columns
    for desired_column in &desired.columns {
        match actual.column(&desired_column.name) {
            None => columns.push(DdlOperation::AddColumn {
                column: desired_column.clone(),
            }),
            Some(actual_column) => {
                columns.extend(alter_column(dialect, actual_column, desired_column)?);
            }
        }
    }
    for actual_column in &actual.columns {
        if desired.column(&actual_column.name).is_none() {
            columns.push(DdlOperation::DropColumn {
                column: actual_column.name.clone(),
            });
        }
    }

    fk_drops.sort();
    index_drops.sort();
    constraint_drops.sort();
    let drops = fk_drops
        .into_iter()
        .map(|name| DdlOperation::DropConstraint { name })
        .chain(index_drops.into_iter().map(|name| DdlOperation::DropIndex { name }))
        .chain(
            constraint_drops
                .into_iter()
                .map(|name| DdlOperation::DropConstraint { name }),
        );

    Ok(drops.chain(columns).chain(additions).collect())
}

/// Column-level changes. An unset `notNull` expresses no opinion and never
/// produces an operation.
fn alter_column(
    dialect: &dyn SqlDialect,
    actual: &Column,
    desired: &Column,
) -> Result<Vec<DdlOperation>, PlanError> {
    let mut operations = Vec::new();
    let column = desired.name.clone();

    // serial types only exist at create time
    let auto_increment_change = match (actual.auto_increment(), desired.auto_increment()) {
        (Some(true), Some(false)) => Some("drop auto increment"),
        (current, Some(true)) if current != Some(true) => Some("become auto increment"),
        _ => None,
    };
    if let Some(change) = auto_increment_change {
        return Err(PlanError::UnsupportedColumnChange { column, change });
    }

    let actual_type = dialect.column_type(actual)?;
    let desired_type = dialect.column_type(desired)?;
    if actual_type != desired_type {
        operations.push(DdlOperation::AlterColumnType {
            column: column.clone(),
            data_type: desired_type,
        });
    }

    match (actual.not_null(), desired.not_null()) {
        (Some(true), Some(false)) => operations.push(DdlOperation::DropNotNull {
            column: column.clone(),
        }),
        (current, Some(true)) if current != Some(true) => {
            operations.push(DdlOperation::SetNotNull {
                column: column.clone(),
            })
        }
        _ => {}
    }

    match (&actual.default, &desired.default) {
        (Some(_), None) => operations.push(DdlOperation::DropDefault { column }),
        (current, Some(value)) if current.as_ref() != Some(value) => {
            operations.push(DdlOperation::SetDefault {
                column,
                value: value.clone(),
            })
        }
        _ => {}
    }

    Ok(operations)
}

fn keyed<T, F>(items: &[T], name: F) -> HashMap<String, &T>
where
    F: Fn(&T) -> String,
{
    items.iter().map(|item| (name(item), item)).collect()
}

/// Renders the planned operations to statements, in order.
pub fn render(
    dialect: &dyn SqlDialect,
    table_name: &str,
    operations: &[DdlOperation],
) -> Result<Vec<String>, PlanError> {
    operations
        .iter()
        .map(|operation| dialect.render_operation(table_name, operation))
        .collect()
}
