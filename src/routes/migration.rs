//! Migration route handlers

use crate::error::ApiResult;
use crate::models::{
    MigrationListQuery, MigrationListResponse, MigrationResponse, ReconcileResponse, SuccessResponse,
};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;
use uuid::Uuid;

/// List migrations, optionally filtered by phase
pub async fn list_migrations(
    State(state): State<SharedState>,
    Query(query): Query<MigrationListQuery>,
) -> ApiResult<Json<SuccessResponse<MigrationListResponse>>> {
    let migrations = state.migrations.list(query.phase).await;
    let count = migrations.len();

    Ok(Json(SuccessResponse::with_data(
        format!("Found {} migration(s).", count),
        MigrationListResponse { migrations, count },
    )))
}

pub async fn get_migration(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<MigrationResponse>>> {
    let migration = state.migrations.get(id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Migration found.",
        MigrationResponse { migration },
    )))
}

/// Approve a migration. The reconcile loop picks it up on its next pass.
pub async fn approve_migration(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<MigrationResponse>>> {
    let migration = state.migrations.approve(id).await?;
    info!(
        migration_id = %id,
        approved_at = migration.status.approved_at,
        "Migration approved"
    );

    Ok(Json(SuccessResponse::with_data(
        "Migration approved.",
        MigrationResponse { migration },
    )))
}

/// Reconcile one migration now instead of waiting for the next pass
pub async fn reconcile_migration(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<ReconcileResponse>>> {
    let migration = state.migrations.get(id).await?;
    let outcome = state.reconciler.reconcile(&migration).await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Reconciled: {:?}.", outcome),
        ReconcileResponse { outcome, migration },
    )))
}
