//! SQL dialects
//!
//! A dialect owns the type registry, quoting rules and statement grammar of
//! one database engine. Normalization and column-type resolution are driven
//! by the registry tables a dialect exposes, so adding an engine means
//! adding table entries and statement renderers rather than new branching.

pub mod postgres;

pub use postgres::PostgresDialect;

use crate::diff::DdlOperation;
use crate::schema::{Column, Extension, SchemaValidationError, TableSchema};
use thiserror::Error;

/// Type normalization failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("{parameter} {value:?} in {raw:?} is not an integer")]
    InvalidParameter {
        raw: String,
        parameter: &'static str,
        value: String,
    },

    #[error("{0:?} is not a recognized type")]
    Unrecognized(String),
}

/// Statement planning failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("column {column:?} has an invalid type {data_type:?}: {source}")]
    ColumnType {
        column: String,
        data_type: String,
        #[source]
        source: TypeError,
    },

    #[error("invalid schema for table {table:?}: {source}")]
    Schema {
        table: String,
        #[source]
        source: SchemaValidationError,
    },

    #[error("column {column:?} cannot {change} on an existing table; recreate the column instead")]
    UnsupportedColumnChange { column: String, change: &'static str },
}

/// One family of parameterized types: a prefix and the function that
/// canonicalizes any type starting with it.
#[derive(Clone, Copy)]
pub struct TypeFamily {
    pub prefix: &'static str,
    pub normalize: fn(&str) -> Result<String, TypeError>,
}

impl std::fmt::Debug for TypeFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeFamily").field("prefix", &self.prefix).finish()
    }
}

/// Dialect-specific DDL generation
pub trait SqlDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Parameterized type families, most specific prefix first.
    fn type_families(&self) -> &'static [TypeFamily];

    /// Shorthand spellings rewritten to their family name before dispatch.
    fn type_aliases(&self) -> &'static [(&'static str, &'static str)];

    /// Type names that never carry parameters.
    fn unparameterized_types(&self) -> &'static [&'static str];

    /// Quotes an identifier (or identifier-like token) for inclusion in SQL text.
    fn quote_identifier(&self, name: &str) -> String;

    /// Quotes a literal value.
    fn quote_literal(&self, value: &str) -> String;

    fn create_table(&self, table_name: &str, schema: &TableSchema) -> Result<String, PlanError>;

    fn create_extension(&self, extension: &Extension) -> Result<String, PlanError>;

    fn drop_table(&self, table_name: &str) -> String;

    /// Renders one diff operation against `table_name`.
    fn render_operation(&self, table_name: &str, operation: &DdlOperation) -> Result<String, PlanError>;

    /// Rewrites a leading alias (`varchar(10)`) to its family name (`character varying(10)`).
    fn unalias_type(&self, raw: &str) -> String {
        for (alias, canonical) in self.type_aliases() {
            if let Some(rest) = raw.strip_prefix(alias) {
                let at_boundary = rest
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_ascii_alphanumeric() && c != '_');
                if at_boundary {
                    return format!("{canonical}{rest}");
                }
            }
        }
        raw.to_string()
    }

    /// Canonicalizes a parameterized type. Strings matching no family yield
    /// an empty string, which callers must treat as unparseable.
    fn normalize_type(&self, raw: &str) -> Result<String, TypeError> {
        let requested = self.unalias_type(raw.trim());
        match self
            .type_families()
            .iter()
            .find(|family| requested.starts_with(family.prefix))
        {
            Some(family) => (family.normalize)(&requested),
            None => Ok(String::new()),
        }
    }

    fn is_parameterized(&self, raw: &str) -> bool {
        !self.unparameterized_types().contains(&raw)
    }

    /// Resolves the canonical type of a column, naming the column on failure.
    fn column_type(&self, column: &Column) -> Result<String, PlanError> {
        let invalid = |source| PlanError::ColumnType {
            column: column.name.clone(),
            data_type: column.data_type.clone(),
            source,
        };

        if !self.is_parameterized(&column.data_type) {
            return Ok(column.data_type.clone());
        }

        let canonical = self.normalize_type(&column.data_type).map_err(invalid)?;
        if canonical.is_empty() {
            return Err(invalid(TypeError::Unrecognized(column.data_type.clone())));
        }
        Ok(canonical)
    }
}
