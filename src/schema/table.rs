//! Desired table shape
//!
//! The structured configuration an operator submits for one table.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Reasons a desired table schema is rejected before planning
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaValidationError {
    #[error("table name is required")]
    EmptyTableName,

    #[error("column at position {0} has no name")]
    EmptyColumnName(usize),

    #[error("column {0} is declared more than once")]
    DuplicateColumn(String),

    #[error("{context} references unknown column {column}")]
    UnknownColumn { context: String, column: String },

    #[error("foreign key on ({columns}) has {local} local columns but {referenced} referenced columns")]
    ForeignKeyArity {
        columns: String,
        local: usize,
        referenced: usize,
    },

    #[error("{0} has no columns")]
    EmptyColumnList(String),

    #[error("foreign key {constraint} has unsupported on delete action {action:?}")]
    InvalidOnDelete { constraint: String, action: String },

    #[error("index {index} has unsupported access method {index_type:?}")]
    InvalidIndexType { index: String, index_type: String },
}

const ON_DELETE_ACTIONS: [&str; 5] = ["cascade", "restrict", "no action", "set null", "set default"];

const INDEX_ACCESS_METHODS: [&str; 6] = ["btree", "hash", "gist", "spgist", "gin", "brin"];

/// Matches `value` case-insensitively against `allowed`, collapsing runs of
/// whitespace, and returns the canonical spelling.
fn canonical_keyword(allowed: &[&'static str], value: &str) -> Option<&'static str> {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    allowed.iter().copied().find(|keyword| *keyword == normalized)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyReferences {
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub references: ForeignKeyReferences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ForeignKey {
    /// Constraint name, falling back to `<table>_<columns>_fkey`
    pub fn constraint_name(&self, table_name: &str) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}_{}_fkey", table_name, self.columns.join("_")),
        }
    }

    /// Canonical `on delete` action. Unset, blank and unsupported values
    /// all yield `None`; `validate` rejects the unsupported ones.
    pub fn on_delete_action(&self) -> Option<&'static str> {
        self.on_delete
            .as_deref()
            .and_then(|action| canonical_keyword(&ON_DELETE_ACTIONS, action))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub index_type: Option<String>,
}

impl Index {
    /// Index name, falling back to `idx_<table>_<columns>`
    pub fn index_name(&self, table_name: &str) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("idx_{}_{}", table_name, self.columns.join("_")),
        }
    }

    /// Canonical access method for `using`, `None` when unset or unsupported
    pub fn access_method(&self) -> Option<&'static str> {
        self.index_type
            .as_deref()
            .and_then(|method| canonical_keyword(&INDEX_ACCESS_METHODS, method))
    }
}

/// Column constraints. `None` means no opinion, which is not the same as `Some(false)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_null: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_increment: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    /// Raw, user-authored type; normalized by the dialect at planning time
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<ColumnConstraints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ColumnAttributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ..Default::default()
        }
    }

    pub fn not_null(&self) -> Option<bool> {
        self.constraints.and_then(|c| c.not_null)
    }

    pub fn auto_increment(&self) -> Option<bool> {
        self.attributes.and_then(|a| a.auto_increment)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check the structural invariants the DDL generator relies on.
    pub fn validate(&self, table_name: &str) -> Result<(), SchemaValidationError> {
        if table_name.trim().is_empty() {
            return Err(SchemaValidationError::EmptyTableName);
        }

        let mut seen = HashSet::new();
        for (position, column) in self.columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(SchemaValidationError::EmptyColumnName(position));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaValidationError::DuplicateColumn(column.name.clone()));
            }
        }

        let require_known = |context: &str, columns: &[String]| {
            if columns.is_empty() {
                return Err(SchemaValidationError::EmptyColumnList(context.to_string()));
            }
            match columns.iter().find(|c| !seen.contains(c.as_str())) {
                Some(column) => Err(SchemaValidationError::UnknownColumn {
                    context: context.to_string(),
                    column: column.clone(),
                }),
                None => Ok(()),
            }
        };

        if !self.primary_key.is_empty() {
            require_known("primary key", &self.primary_key)?;
        }

        for index in &self.indexes {
            let index_name = index.index_name(table_name);
            require_known(&format!("index {index_name}"), &index.columns)?;
            if let Some(index_type) = index.index_type.as_deref().filter(|t| !t.trim().is_empty()) {
                if index.access_method().is_none() {
                    return Err(SchemaValidationError::InvalidIndexType {
                        index: index_name,
                        index_type: index_type.to_string(),
                    });
                }
            }
        }

        for foreign_key in &self.foreign_keys {
            require_known(
                &format!("foreign key {}", foreign_key.constraint_name(table_name)),
                &foreign_key.columns,
            )?;
            if foreign_key.columns.len() != foreign_key.references.columns.len() {
                return Err(SchemaValidationError::ForeignKeyArity {
                    columns: foreign_key.columns.join(", "),
                    local: foreign_key.columns.len(),
                    referenced: foreign_key.references.columns.len(),
                });
            }
            if let Some(action) = foreign_key.on_delete.as_deref().filter(|a| !a.trim().is_empty()) {
                if foreign_key.on_delete_action().is_none() {
                    return Err(SchemaValidationError::InvalidOnDelete {
                        constraint: foreign_key.constraint_name(table_name),
                        action: action.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
