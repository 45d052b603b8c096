//! Audit log query handler.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::AuditEntry;
use crate::AppState;

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    #[serde(default)]
    pub order: SortOrder,
    pub limit: Option<usize>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub entries: Vec<AuditEntry>,
    /// Size of the full trail, before `limit`.
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Audit trail, newest first unless `order=asc`.
///
/// GET /audit-log
#[tracing::instrument(skip(state), fields(order = ?query.order, limit = ?query.limit))]
pub async fn get_audit_log(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Json<AuditLogResponse> {
    let mut entries = state.authority.get_audit_log();
    let total = entries.len();

    if query.order == SortOrder::Desc {
        entries.reverse();
    }
    if let Some(limit) = query.limit {
        entries.truncate(limit);
    }

    Json(AuditLogResponse { entries, total })
}
