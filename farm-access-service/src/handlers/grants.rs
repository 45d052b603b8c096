//! Admin handlers for issuing, listing and revoking access grants.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateGrantRequest, GrantSummary, IssuedGrant};
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GrantListResponse {
    pub grants: Vec<GrantSummary>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Issue a grant. The secret in the response is never shown again.
///
/// POST /grants
#[tracing::instrument(
    skip(state, payload),
    fields(subject = %payload.subject.identifier, role = %payload.subject.role)
)]
pub async fn create_grant(
    State(state): State<AppState>,
    Json(payload): Json<CreateGrantRequest>,
) -> Result<(StatusCode, Json<IssuedGrant>), AppError> {
    payload.validate()?;

    let duration_minutes = payload
        .duration_minutes
        .unwrap_or(state.authority.config().default_duration_minutes);

    let issued = state
        .authority
        .issue_grant(payload.subject, payload.permissions, duration_minutes)?;

    tracing::info!(grant_id = %issued.grant_id, "Grant created");

    Ok((StatusCode::CREATED, Json(issued)))
}

/// List active grants.
///
/// GET /grants
#[tracing::instrument(skip(state))]
pub async fn list_grants(State(state): State<AppState>) -> Json<GrantListResponse> {
    let grants = state.authority.list_active_grants();
    Json(GrantListResponse {
        total: grants.len(),
        grants,
    })
}

/// Revoke the grant behind a secret. Unknown secrets still answer 204.
///
/// DELETE /grants/:secret
#[tracing::instrument(skip_all)]
pub async fn revoke_grant(
    State(state): State<AppState>,
    Path(secret): Path<String>,
) -> StatusCode {
    state.authority.revoke_grant(&secret);
    StatusCode::NO_CONTENT
}

/// Revoke a grant by its public id.
///
/// DELETE /grants/by-id/:grant_id
#[tracing::instrument(skip(state), fields(grant_id = %grant_id))]
pub async fn revoke_grant_by_id(
    State(state): State<AppState>,
    Path(grant_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.authority.revoke_grant_by_id(grant_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!(
            "No active grant with id {}",
            grant_id
        )))
    }
}
