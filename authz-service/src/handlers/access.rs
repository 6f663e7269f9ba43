use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use platform_core::error::AppError;

use crate::{middleware::CurrentUser, AppState};

/// What the caller may do within a tenant, computed from the same guard the
/// write paths use.
#[derive(Debug, Serialize)]
pub struct AccessSummary {
    pub member: bool,
    pub admin: bool,
    pub permissions: Vec<String>,
}

/// GET /orgs/:org_id/access — the caller's standing in an organization.
/// Denied with 403 unless the caller can read the organization at all.
pub async fn organization_access(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .guard
        .ensure_organization_readable(org_id, &principal)
        .await?;

    let summary = AccessSummary {
        member: state.guard.is_organization_member(&principal, org_id).await,
        admin: state.guard.is_organization_admin(&principal, org_id).await,
        permissions: sorted_codes(&principal),
    };
    Ok(Json(summary))
}

/// GET /projects/:project_id/access — the caller's standing in a project.
pub async fn project_access(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .guard
        .ensure_project_readable(project_id, &principal)
        .await?;

    let summary = AccessSummary {
        member: state.guard.is_project_member(&principal, project_id).await,
        admin: state.guard.is_project_admin(&principal, project_id).await,
        permissions: sorted_codes(&principal),
    };
    Ok(Json(summary))
}

fn sorted_codes(principal: &crate::models::Principal) -> Vec<String> {
    let mut codes: Vec<String> = principal.effective_permissions().iter().cloned().collect();
    codes.sort();
    codes
}
