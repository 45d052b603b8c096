//! Access grant model - time-boxed, revocable delegated access to farm records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;
use validator::Validate;

use super::role::{DataType, Permission, Role};

/// External identity a grant is issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Subject {
    /// Name or email of the external party.
    #[validate(length(min = 1, max = 200))]
    pub identifier: String,
    pub role: Role,
    /// Requested data types. Kept verbatim; entries that are not known data
    /// types are accepted and simply expose nothing.
    #[serde(default, alias = "dataTypes")]
    pub data_types: Vec<String>,
}

impl Subject {
    pub fn new(identifier: impl Into<String>, role: Role, data_types: &[&str]) -> Self {
        Self {
            identifier: identifier.into(),
            role,
            data_types: data_types.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Requested data types that are known, in request order, deduplicated.
    pub fn known_data_types(&self) -> Vec<DataType> {
        let mut seen = BTreeSet::new();
        self.data_types
            .iter()
            .filter_map(|raw| match raw.parse::<DataType>() {
                Ok(data_type) => Some(data_type),
                Err(e) => {
                    tracing::debug!(subject = %self.identifier, "Ignoring requested data type: {}", e);
                    None
                }
            })
            .filter(|data_type| seen.insert(*data_type))
            .collect()
    }
}

/// Derived lifecycle state of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantStatus {
    Active,
    Expired,
}

/// A live grant as held by the authority. The bearer secret itself is never
/// stored, only its digest.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub grant_id: Uuid,
    pub secret_hash: String,
    pub subject: Subject,
    pub permissions: BTreeSet<Permission>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessGrant {
    pub fn new(
        secret_hash: String,
        subject: Subject,
        permissions: BTreeSet<Permission>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            grant_id: Uuid::new_v4(),
            secret_hash,
            subject,
            permissions,
            issued_at,
            expires_at,
        }
    }

    /// A grant is expired from `expires_at` onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> GrantStatus {
        if self.is_expired_at(now) {
            GrantStatus::Expired
        } else {
            GrantStatus::Active
        }
    }
}

/// What the issuer gets back. The secret is shown exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedGrant {
    pub grant_id: Uuid,
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

/// Admin-facing view of a grant. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantSummary {
    pub grant_id: Uuid,
    pub subject: Subject,
    pub permissions: BTreeSet<Permission>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: GrantStatus,
}

impl GrantSummary {
    pub fn from_grant(grant: &AccessGrant, now: DateTime<Utc>) -> Self {
        Self {
            grant_id: grant.grant_id,
            subject: grant.subject.clone(),
            permissions: grant.permissions.clone(),
            issued_at: grant.issued_at,
            expires_at: grant.expires_at,
            status: grant.status_at(now),
        }
    }
}

/// Request to issue a grant.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGrantRequest {
    #[validate(nested)]
    pub subject: Subject,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(alias = "durationMinutes")]
    pub duration_minutes: Option<i64>,
}
