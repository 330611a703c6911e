//! CREATE statements
//!
//! Assembly order inside `create table` is fixed: columns, primary key,
//! unique-index constraints, foreign keys.

use super::identifier::{quote_identifier, quote_list, quote_literal};
use super::PostgresDialect;
use crate::database::{PlanError, SqlDialect};
use crate::schema::{Column, Extension, ForeignKey, TableSchema};

/// Builds `create table` for a desired schema. Non-unique indexes are not
/// part of this statement.
pub fn create_table_statement(
    dialect: &PostgresDialect,
    table_name: &str,
    schema: &TableSchema,
) -> Result<String, PlanError> {
    let mut fragments = schema
        .columns
        .iter()
        .map(|column| column_definition(dialect, column))
        .collect::<Result<Vec<_>, _>>()?;

    if !schema.primary_key.is_empty() {
        fragments.push(format!("primary key ({})", quote_list(&schema.primary_key)));
    }

    for index in schema.indexes.iter().filter(|index| index.is_unique) {
        fragments.push(format!(
            "constraint {} unique ({})",
            quote_identifier(&index.index_name(table_name)),
            quote_list(&index.columns)
        ));
    }

    for foreign_key in &schema.foreign_keys {
        fragments.push(foreign_key_constraint_clause(table_name, foreign_key));
    }

    Ok(format!(
        "create table {} ({})",
        quote_identifier(table_name),
        fragments.join(", ")
    ))
}

/// Renders `"<name>" <type>[ not null][ default '<value>']`.
///
/// Only an explicit `true` adds `not null` or switches to a serial type;
/// unset and `false` leave the column as authored.
pub fn column_definition(dialect: &PostgresDialect, column: &Column) -> Result<String, PlanError> {
    let mut data_type = dialect.column_type(column)?;
    if column.auto_increment() == Some(true) {
        data_type = serial_type(&data_type).unwrap_or(data_type);
    }

    let mut definition = format!("{} {}", quote_identifier(&column.name), data_type);

    if column.not_null() == Some(true) {
        definition.push_str(" not null");
    }

    if let Some(default) = &column.default {
        definition.push_str(&format!(" default {}", quote_literal(default)));
    }

    Ok(definition)
}

fn serial_type(data_type: &str) -> Option<String> {
    let serial = match data_type {
        "smallint" => "smallserial",
        "integer" => "serial",
        "bigint" => "bigserial",
        _ => return None,
    };
    Some(serial.to_string())
}

pub fn foreign_key_constraint_clause(table_name: &str, foreign_key: &ForeignKey) -> String {
    let mut clause = format!(
        "constraint {} foreign key ({}) references {} ({})",
        quote_identifier(&foreign_key.constraint_name(table_name)),
        quote_list(&foreign_key.columns),
        quote_identifier(&foreign_key.references.table),
        quote_list(&foreign_key.references.columns)
    );

    if let Some(action) = foreign_key.on_delete_action() {
        clause.push_str(&format!(" on delete {action}"));
    }

    clause
}

/// Builds `create extension`. When both a schema and a version are set only
/// the version clause is emitted.
pub fn create_extension_statement(extension: &Extension) -> Result<String, PlanError> {
    let force_clause = if extension.force { "" } else { " if not exists" };

    let mut with_clause = String::new();
    if let Some(schema) = &extension.schema {
        with_clause = format!(" schema {}", quote_identifier(schema));
    }
    if let Some(version) = &extension.version {
        with_clause = format!(" version {}", quote_identifier(version));
    }

    Ok(format!(
        "create extension {}{}{}",
        quote_identifier(&extension.name),
        force_clause,
        with_clause
    ))
}

pub fn drop_table_statement(table_name: &str) -> String {
    format!("drop table {}", quote_identifier(table_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnAttributes, ColumnConstraints, ForeignKeyReferences, Index};
    use pretty_assertions::assert_eq;

    fn columns(specs: &[(&str, &str)]) -> Vec<Column> {
        specs.iter().map(|(name, ty)| Column::new(*name, *ty)).collect()
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn create_table(table_name: &str, schema: &TableSchema) -> String {
        create_table_statement(&PostgresDialect::new(), table_name, schema).unwrap()
    }

    #[test]
    fn test_create_table_simple() {
        let schema = TableSchema {
            primary_key: names(&["id"]),
            columns: columns(&[("id", "integer")]),
            ..Default::default()
        };
        assert_eq!(
            create_table("simple", &schema),
            r#"create table "simple" ("id" integer, primary key ("id"))"#
        );
    }

    #[test]
    fn test_create_table_composite_primary_key() {
        let schema = TableSchema {
            primary_key: names(&["one", "two"]),
            columns: columns(&[("one", "integer"), ("two", "integer"), ("three", "varchar(255)")]),
            ..Default::default()
        };
        assert_eq!(
            create_table("composite_primary_key", &schema),
            r#"create table "composite_primary_key" ("one" integer, "two" integer, "three" character varying (255), primary key ("one", "two"))"#
        );
    }

    #[test]
    fn test_create_table_composite_unique_index() {
        let schema = TableSchema {
            primary_key: names(&["one"]),
            indexes: vec![Index {
                columns: names(&["two", "three"]),
                is_unique: true,
                ..Default::default()
            }],
            columns: columns(&[("one", "integer"), ("two", "integer"), ("three", "varchar(255)")]),
            ..Default::default()
        };
        assert_eq!(
            create_table("composite_unique_index", &schema),
            r#"create table "composite_unique_index" ("one" integer, "two" integer, "three" character varying (255), primary key ("one"), constraint "idx_composite_unique_index_two_three" unique ("two", "three"))"#
        );
    }

    #[test]
    fn test_create_table_without_primary_key() {
        let schema = TableSchema {
            columns: columns(&[("body", "text")]),
            ..Default::default()
        };
        let statement = create_table("notes", &schema);
        assert_eq!(statement, r#"create table "notes" ("body" text)"#);
        assert!(!statement.contains("primary key"));
    }

    #[test]
    fn test_create_table_skips_non_unique_indexes() {
        let schema = TableSchema {
            columns: columns(&[("a", "integer"), ("b", "integer")]),
            indexes: vec![
                Index {
                    columns: names(&["a"]),
                    ..Default::default()
                },
                Index {
                    columns: names(&["b"]),
                    name: Some("b_unique".to_string()),
                    is_unique: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            create_table("t", &schema),
            r#"create table "t" ("a" integer, "b" integer, constraint "b_unique" unique ("b"))"#
        );
    }

    #[test]
    fn test_create_table_with_foreign_keys() {
        let schema = TableSchema {
            primary_key: names(&["id"]),
            columns: columns(&[("id", "integer"), ("org_id", "integer"), ("team", "text")]),
            indexes: vec![Index {
                columns: names(&["team"]),
                is_unique: true,
                ..Default::default()
            }],
            foreign_keys: vec![
                ForeignKey {
                    columns: names(&["org_id"]),
                    references: ForeignKeyReferences {
                        table: "orgs".to_string(),
                        columns: names(&["id"]),
                    },
                    on_delete: Some("cascade".to_string()),
                    name: None,
                },
                ForeignKey {
                    columns: names(&["team"]),
                    references: ForeignKeyReferences {
                        table: "teams".to_string(),
                        columns: names(&["slug"]),
                    },
                    on_delete: None,
                    name: Some("member_team".to_string()),
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            create_table("members", &schema),
            concat!(
                r#"create table "members" ("id" integer, "org_id" integer, "team" text, "#,
                r#"primary key ("id"), constraint "idx_members_team" unique ("team"), "#,
                r#"constraint "members_org_id_fkey" foreign key ("org_id") references "orgs" ("id") on delete cascade, "#,
                r#"constraint "member_team" foreign key ("team") references "teams" ("slug"))"#
            )
        );
    }

    #[test]
    fn test_foreign_key_clause_never_carries_raw_action_text() {
        let mut foreign_key = ForeignKey {
            columns: names(&["org_id"]),
            references: ForeignKeyReferences {
                table: "orgs".to_string(),
                columns: names(&["id"]),
            },
            on_delete: Some("cascade); drop table users; --".to_string()),
            name: None,
        };
        assert_eq!(
            foreign_key_constraint_clause("t", &foreign_key),
            r#"constraint "t_org_id_fkey" foreign key ("org_id") references "orgs" ("id")"#
        );

        foreign_key.on_delete = Some("No Action".to_string());
        assert_eq!(
            foreign_key_constraint_clause("t", &foreign_key),
            r#"constraint "t_org_id_fkey" foreign key ("org_id") references "orgs" ("id") on delete no action"#
        );
    }

    #[test]
    fn test_column_definition_tri_state() {
        let dialect = PostgresDialect::new();
        let mut column = Column::new("id", "integer");
        assert_eq!(column_definition(&dialect, &column).unwrap(), r#""id" integer"#);

        column.constraints = Some(ColumnConstraints { not_null: Some(false) });
        column.attributes = Some(ColumnAttributes { auto_increment: Some(false) });
        assert_eq!(column_definition(&dialect, &column).unwrap(), r#""id" integer"#);

        column.constraints = Some(ColumnConstraints { not_null: Some(true) });
        column.attributes = Some(ColumnAttributes { auto_increment: Some(true) });
        assert_eq!(column_definition(&dialect, &column).unwrap(), r#""id" serial not null"#);
    }

    #[test]
    fn test_column_definition_default() {
        let dialect = PostgresDialect::new();
        let mut column = Column::new("status", "varchar(16)");
        column.default = Some("it's new".to_string());
        assert_eq!(
            column_definition(&dialect, &column).unwrap(),
            r#""status" character varying (16) default 'it''s new'"#
        );
    }

    #[test]
    fn test_column_error_names_offending_column() {
        let schema = TableSchema {
            columns: columns(&[("id", "integer"), ("flags", "bit()"), ("later", "bogus")]),
            ..Default::default()
        };
        let err = create_table_statement(&PostgresDialect::new(), "t", &schema).unwrap_err();
        assert!(matches!(&err, PlanError::ColumnType { column, .. } if column == "flags"));
        assert!(err.to_string().contains("bit()"));
    }

    #[test]
    fn test_unrecognized_column_type_is_rejected() {
        let schema = TableSchema {
            columns: columns(&[("amount", "decimal(10,2)")]),
            ..Default::default()
        };
        let err = create_table_statement(&PostgresDialect::new(), "t", &schema).unwrap_err();
        assert!(matches!(err, PlanError::ColumnType { column, .. } if column == "amount"));
    }

    #[test]
    fn test_create_extension() {
        let schema = "public".to_string();
        let version = "2.0.3".to_string();
        let cases = [
            (Extension::new("citext"), r#"create extension "citext" if not exists"#),
            (
                Extension {
                    schema: Some(schema.clone()),
                    ..Extension::new("hstore")
                },
                r#"create extension "hstore" if not exists schema "public""#,
            ),
            (
                Extension {
                    schema: Some(schema.clone()),
                    version: Some(version.clone()),
                    ..Extension::new("postgres_fdw")
                },
                r#"create extension "postgres_fdw" if not exists version "2.0.3""#,
            ),
            (
                Extension {
                    force: true,
                    ..Extension::new("postgis")
                },
                r#"create extension "postgis""#,
            ),
        ];

        for (extension, expected) in cases {
            assert_eq!(create_extension_statement(&extension).unwrap(), expected);
        }
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(drop_table_statement("old"), r#"drop table "old""#);
    }
}
