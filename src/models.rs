//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains all request/response structures used by the API.

use crate::migration::{Migration, MigrationPhase};
use crate::reconciler::ReconcileOutcome;
use crate::schema::{Extension, TableSchema};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Request to plan a table migration
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlanTableRequest {
    #[validate(length(min = 1, max = 63, message = "Database name must be between 1 and 63 characters"))]
    pub database_name: String,

    #[validate(length(min = 1, max = 63, message = "Table name must be between 1 and 63 characters"))]
    pub table_name: String,

    pub schema: TableSchema,

    /// Current shape of the table. Defaults to the schema of the last
    /// executed migration for the same table.
    #[serde(default)]
    pub previous: Option<TableSchema>,
}

/// Request to plan an extension migration
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlanExtensionRequest {
    #[validate(length(min = 1, max = 63, message = "Database name must be between 1 and 63 characters"))]
    pub database_name: String,

    #[validate(custom(function = "validate_extension_name"))]
    pub extension: Extension,
}

fn validate_extension_name(extension: &Extension) -> Result<(), validator::ValidationError> {
    if extension.name.trim().is_empty() {
        let mut error = validator::ValidationError::new("extension_name");
        error.message = Some("Extension name is required".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct MigrationListQuery {
    pub phase: Option<MigrationPhase>,
}

/// Result of a plan request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    /// Absent when the table already matches the desired schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<Migration>,
    /// False when an identical pending migration already existed
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct MigrationResponse {
    pub migration: Migration,
}

#[derive(Debug, Serialize)]
pub struct MigrationListResponse {
    pub migrations: Vec<Migration>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub outcome: ReconcileOutcome,
    pub migration: Migration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_table_request_validation() {
        let request: PlanTableRequest = serde_json::from_value(serde_json::json!({
            "databaseName": "app",
            "tableName": "",
            "schema": { "columns": [{ "name": "id", "type": "integer" }] }
        }))
        .unwrap();
        assert!(request.validate().is_err());
        assert!(request.previous.is_none());
    }

    #[test]
    fn test_plan_extension_request_validation() {
        let request: PlanExtensionRequest = serde_json::from_value(serde_json::json!({
            "databaseName": "app",
            "extension": { "name": " " }
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let request: PlanExtensionRequest = serde_json::from_value(serde_json::json!({
            "databaseName": "app",
            "extension": { "name": "citext", "force": true }
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert!(request.extension.force);
    }

    #[test]
    fn test_success_response_flattens_data() {
        let response = SuccessResponse::with_data(
            "Listed",
            MigrationListResponse {
                migrations: Vec::new(),
                count: 0,
            },
        );
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["count"], 0);
    }
}
