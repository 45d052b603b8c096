//! Audit entry model - append-only trail of grant lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Grant lifecycle actions recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    TokenCreated,
    TokenValidated,
    TokenExpired,
    TokenRevoked,
    /// Valid grant presented for a capability it does not carry.
    AccessDenied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::TokenCreated => "token_created",
            AuditAction::TokenValidated => "token_validated",
            AuditAction::TokenExpired => "token_expired",
            AuditAction::TokenRevoked => "token_revoked",
            AuditAction::AccessDenied => "access_denied",
        }
    }
}

/// Audit entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// Identifier of the external party the grant was issued to.
    pub subject: String,
    pub action: AuditAction,
    pub grant_id: Uuid,
    pub details: String,
}

impl AuditEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        subject: impl Into<String>,
        action: AuditAction,
        grant_id: Uuid,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            subject: subject.into(),
            action,
            grant_id,
            details: details.into(),
        }
    }
}
