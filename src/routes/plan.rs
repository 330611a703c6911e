//! Planning route handlers
//!
//! Desired state in, pending migration out. Nothing touches a target
//! database here; statements run only after approval.

use crate::error::{validation_error, ApiResult};
use crate::models::{PlanExtensionRequest, PlanResponse, PlanTableRequest, SuccessResponse};
use crate::state::SharedState;
use axum::{extract::State, Json};
use tracing::{debug, info};
use validator::Validate;

/// Plan a create, alter or drop of one table
pub async fn plan_table(
    State(state): State<SharedState>,
    Json(payload): Json<PlanTableRequest>,
) -> ApiResult<Json<SuccessResponse<PlanResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let PlanTableRequest {
        database_name,
        table_name,
        schema,
        previous,
    } = payload;

    let previous = match previous {
        Some(previous) => Some(previous),
        None => state.migrations.last_executed_schema(&database_name, &table_name).await,
    };
    debug!(
        database = %database_name,
        table = %table_name,
        has_previous = previous.is_some(),
        "Planning table"
    );

    let Some(migration) = state
        .planner
        .plan_table(&database_name, &table_name, schema, previous)?
    else {
        return Ok(Json(SuccessResponse::with_data(
            format!("Table '{}' already matches the desired schema.", table_name),
            PlanResponse {
                migration: None,
                created: false,
            },
        )));
    };

    let (migration, created) = state.migrations.insert(migration).await;
    if created {
        info!(
            migration_id = %migration.id,
            database = %database_name,
            table = %table_name,
            statements = migration.statements.len(),
            "Migration planned"
        );
    }

    let message = if created {
        format!("Migration planned for table '{}'.", table_name)
    } else {
        format!("An identical migration for table '{}' is already pending.", table_name)
    };

    Ok(Json(SuccessResponse::with_data(
        message,
        PlanResponse {
            migration: Some(migration),
            created,
        },
    )))
}

/// Plan a create extension
pub async fn plan_extension(
    State(state): State<SharedState>,
    Json(payload): Json<PlanExtensionRequest>,
) -> ApiResult<Json<SuccessResponse<PlanResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let extension_name = payload.extension.name.clone();
    let migration = state
        .planner
        .plan_extension(&payload.database_name, payload.extension)?;
    let (migration, created) = state.migrations.insert(migration).await;

    if created {
        info!(
            migration_id = %migration.id,
            database = %payload.database_name,
            extension = %extension_name,
            "Migration planned"
        );
    }

    Ok(Json(SuccessResponse::with_data(
        format!("Migration planned for extension '{}'.", extension_name),
        PlanResponse {
            migration: Some(migration),
            created,
        },
    )))
}
