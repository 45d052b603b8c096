//! Access token authority.
//!
//! Sole owner of the live grant table and the audit trail. Decides whether a
//! presented bearer secret currently carries a capability, and produces the
//! field-projected record view a valid grant is entitled to.
//!
//! Expected outcomes (unknown secret, expired grant, missing capability) are
//! plain `false` / `None` results. Errors are reserved for invalid input, a
//! broken random source, record store failures and report rendering failures.

use chrono::{DateTime, Duration, Utc};
use service_core::error::AppError;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    project, AccessGrant, AuditAction, AuditEntry, GrantSummary, IssuedGrant, Permission,
    RecordBundle, ReportFormat, Subject,
};
use crate::services::clock::{Clock, SystemClock};
use crate::services::health_check::HealthCheckSource;
use crate::services::permissions::permitted_fields;
use crate::services::record_store::RecordStore;
use crate::services::report::ReportGenerator;
use crate::services::secret::{generate_secret, hash_secret};

/// Fresh secrets tried before issuance gives up.
pub const MAX_SECRET_ATTEMPTS: usize = 3;

/// Largest grant ceiling a deployment may configure (one year).
pub const DURATION_CEILING_MINUTES: i64 = 366 * 24 * 60;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Grant duration must be between 1 and {max} minutes, got {requested}")]
    InvalidDuration { requested: i64, max: i64 },

    #[error("Failed to generate a unique access secret after {0} attempts")]
    SecretCollision(usize),
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::InvalidDuration { .. } => {
                AppError::UnprocessableEntity(anyhow::Error::new(err))
            }
            AccessError::SecretCollision(_) => AppError::InternalError(anyhow::Error::new(err)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Used when the issuer does not ask for a duration.
    pub default_duration_minutes: i64,
    /// Hard ceiling on grant lifetime.
    pub max_duration_minutes: i64,
    /// Record `access_denied` when a valid grant lacks a capability.
    pub audit_permission_denied: bool,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: 60,
            max_duration_minutes: 24 * 60,
            audit_permission_denied: true,
        }
    }
}

/// Outcome of a report request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLookup {
    Unauthorized,
    NoReport,
    Rendered(String),
}

type SecretGenerator = Box<dyn Fn() -> String + Send + Sync>;

#[derive(Default)]
struct AuthorityState {
    /// Live grants keyed by secret digest.
    grants: HashMap<String, AccessGrant>,
    /// Digests of revoked grants, kept until their original expiry.
    revoked: HashMap<String, DateTime<Utc>>,
    audit: Vec<AuditEntry>,
}

impl AuthorityState {
    fn append(
        &mut self,
        timestamp: DateTime<Utc>,
        grant: &AccessGrant,
        action: AuditAction,
        details: String,
    ) {
        self.audit.push(AuditEntry::new(
            timestamp,
            grant.subject.identifier.clone(),
            action,
            grant.grant_id,
            details,
        ));
    }

    fn expire(&mut self, hash: &str, now: DateTime<Utc>) -> Option<AccessGrant> {
        let grant = self.grants.remove(hash)?;
        self.append(
            now,
            &grant,
            AuditAction::TokenExpired,
            format!("expired_at={}", grant.expires_at.to_rfc3339()),
        );
        metrics::counter!("access_grants_expired_total").increment(1);
        tracing::info!(
            grant_id = %grant.grant_id,
            subject = %grant.subject.identifier,
            "Access grant expired"
        );
        Some(grant)
    }

    fn revoke(&mut self, hash: &str, now: DateTime<Utc>) -> Option<AccessGrant> {
        let grant = self.grants.remove(hash)?;
        self.revoked.insert(hash.to_string(), grant.expires_at);
        self.append(
            now,
            &grant,
            AuditAction::TokenRevoked,
            format!("revoked {} before expiry", format_remaining(grant.expires_at - now)),
        );
        metrics::counter!("access_grants_revoked_total").increment(1);
        tracing::info!(
            grant_id = %grant.grant_id,
            subject = %grant.subject.identifier,
            "Access grant revoked"
        );
        Some(grant)
    }

    /// Remove a grant on request: revoked if still live, expired if past its
    /// expiry. Returns the action recorded.
    fn retire(&mut self, hash: &str, now: DateTime<Utc>) -> Option<AuditAction> {
        if self.grants.get(hash)?.is_expired_at(now) {
            self.expire(hash, now).map(|_| AuditAction::TokenExpired)
        } else {
            self.revoke(hash, now).map(|_| AuditAction::TokenRevoked)
        }
    }

    fn publish_active(&self) {
        metrics::gauge!("access_grants_active").set(self.grants.len() as f64);
    }
}

fn format_remaining(remaining: Duration) -> String {
    let minutes = remaining.num_minutes().max(0);
    format!("{}m", minutes)
}

fn join<T: std::fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Issues, validates, revokes and audits external access grants.
pub struct AccessTokenAuthority {
    config: AuthorityConfig,
    clock: Arc<dyn Clock>,
    records: Arc<dyn RecordStore>,
    health: Arc<dyn HealthCheckSource>,
    reports: Arc<dyn ReportGenerator>,
    secrets: SecretGenerator,
    state: Mutex<AuthorityState>,
}

impl AccessTokenAuthority {
    pub fn new(
        config: AuthorityConfig,
        records: Arc<dyn RecordStore>,
        health: Arc<dyn HealthCheckSource>,
        reports: Arc<dyn ReportGenerator>,
    ) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            records,
            health,
            reports,
            secrets: Box::new(generate_secret),
            state: Mutex::new(AuthorityState::default()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the secret source. Only useful for exercising collision
    /// handling; production always uses OS randomness.
    pub fn with_secret_generator(
        mut self,
        generator: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.secrets = Box::new(generator);
        self
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, AuthorityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a grant and return its secret. The secret is not retrievable
    /// afterwards.
    pub fn issue_grant(
        &self,
        subject: Subject,
        permissions: impl IntoIterator<Item = Permission>,
        duration_minutes: i64,
    ) -> Result<IssuedGrant, AccessError> {
        let max = self.config.max_duration_minutes;
        if duration_minutes < 1 || duration_minutes > max {
            return Err(AccessError::InvalidDuration {
                requested: duration_minutes,
                max,
            });
        }

        let mut permissions: BTreeSet<Permission> = permissions.into_iter().collect();
        if permissions.is_empty() {
            permissions.insert(Permission::View);
        }

        let now = self.clock.now();
        let expires_at = Duration::try_minutes(duration_minutes)
            .and_then(|duration| now.checked_add_signed(duration))
            .ok_or(AccessError::InvalidDuration {
                requested: duration_minutes,
                max,
            })?;

        let mut state = self.lock();

        let mut unique = None;
        for attempt in 1..=MAX_SECRET_ATTEMPTS {
            let secret = (self.secrets)();
            let hash = hash_secret(&secret);
            if state.grants.contains_key(&hash) || state.revoked.contains_key(&hash) {
                tracing::warn!(attempt, "Generated access secret collides with a tracked grant");
                continue;
            }
            unique = Some((secret, hash));
            break;
        }

        let Some((secret, hash)) = unique else {
            tracing::error!(
                attempts = MAX_SECRET_ATTEMPTS,
                "Secret generation keeps colliding; random source is broken"
            );
            return Err(AccessError::SecretCollision(MAX_SECRET_ATTEMPTS));
        };

        let grant = AccessGrant::new(
            hash.clone(),
            subject,
            permissions,
            now,
            expires_at,
        );

        let issued = IssuedGrant {
            grant_id: grant.grant_id,
            secret,
            expires_at: grant.expires_at,
        };

        state.append(
            now,
            &grant,
            AuditAction::TokenCreated,
            format!(
                "role={} permissions={} data_types={} expires_at={}",
                grant.subject.role,
                join(&grant.permissions),
                grant.subject.data_types.join(","),
                grant.expires_at.to_rfc3339()
            ),
        );

        tracing::info!(
            grant_id = %grant.grant_id,
            subject = %grant.subject.identifier,
            role = %grant.subject.role,
            duration_minutes,
            "Access grant issued"
        );

        state.grants.insert(hash, grant);
        state.publish_active();
        metrics::counter!("access_grants_issued_total").increment(1);

        Ok(issued)
    }

    /// Look up and check a grant, recording the outcome. Returns the grant
    /// when it is live and carries `required`.
    fn authorize(&self, secret: &str, required: Permission) -> Option<AccessGrant> {
        let hash = hash_secret(secret);
        let now = self.clock.now();
        let mut state = self.lock();

        if state.revoked.contains_key(&hash) {
            if state.grants.remove(&hash).is_some() {
                tracing::error!("Revoked access grant found in the live table; dropped");
                state.publish_active();
            }
            metrics::counter!("access_grant_validations_total", "outcome" => "revoked")
                .increment(1);
            return None;
        }

        let (expired, allowed) = match state.grants.get(&hash) {
            Some(grant) => (grant.is_expired_at(now), grant.allows(required)),
            None => {
                metrics::counter!("access_grant_validations_total", "outcome" => "unknown")
                    .increment(1);
                return None;
            }
        };

        if expired {
            state.expire(&hash, now);
            state.publish_active();
            metrics::counter!("access_grant_validations_total", "outcome" => "expired")
                .increment(1);
            return None;
        }

        let grant = state.grants.get(&hash)?.clone();

        if !allowed {
            if self.config.audit_permission_denied {
                state.append(
                    now,
                    &grant,
                    AuditAction::AccessDenied,
                    format!("missing permission={}", required),
                );
            }
            tracing::warn!(
                grant_id = %grant.grant_id,
                subject = %grant.subject.identifier,
                permission = %required,
                "Access grant lacks required permission"
            );
            metrics::counter!("access_grant_validations_total", "outcome" => "denied")
                .increment(1);
            return None;
        }

        state.append(
            now,
            &grant,
            AuditAction::TokenValidated,
            format!("permission={}", required),
        );
        metrics::counter!("access_grant_validations_total", "outcome" => "validated")
            .increment(1);

        Some(grant)
    }

    /// Whether `secret` currently authorizes `required`.
    pub fn validate_grant(&self, secret: &str, required: Permission) -> bool {
        self.authorize(secret, required).is_some()
    }

    /// Revoke the grant behind `secret`. Unknown secrets are a no-op; a grant
    /// already past its expiry is recorded as expired.
    pub fn revoke_grant(&self, secret: &str) {
        let hash = hash_secret(secret);
        let now = self.clock.now();
        let mut state = self.lock();
        if state.retire(&hash, now).is_some() {
            state.publish_active();
        }
    }

    /// Revoke by public grant id. Returns whether a live grant was revoked.
    pub fn revoke_grant_by_id(&self, grant_id: Uuid) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();

        let hash = state
            .grants
            .iter()
            .find(|(_, grant)| grant.grant_id == grant_id)
            .map(|(hash, _)| hash.clone());

        match hash {
            Some(hash) => {
                let action = state.retire(&hash, now);
                state.publish_active();
                action == Some(AuditAction::TokenRevoked)
            }
            None => false,
        }
    }

    async fn assemble_bundle(&self, grant: &AccessGrant) -> Result<RecordBundle, AppError> {
        let mut bundle = RecordBundle::default();

        for data_type in grant.subject.known_data_types() {
            for &collection in data_type.collections() {
                let permitted = permitted_fields(grant.subject.role, collection);
                if permitted.is_empty() || bundle.contains(collection) {
                    continue;
                }

                let projected = self
                    .records
                    .fetch(collection)
                    .await?
                    .iter()
                    .map(|record| project(record, permitted))
                    .collect();
                bundle.collections.insert(collection, projected);
            }
        }

        bundle.last_health_check = self.health.latest().await.map(|result| result.checked_at);

        tracing::debug!(
            grant_id = %grant.grant_id,
            collections = bundle.collections.len(),
            "Assembled filtered record bundle"
        );

        Ok(bundle)
    }

    /// Field-projected records for a grant holding `view`. `None` when the
    /// secret does not currently authorize viewing.
    pub async fn get_filtered_records(
        &self,
        secret: &str,
    ) -> Result<Option<RecordBundle>, AppError> {
        let Some(grant) = self.authorize(secret, Permission::View) else {
            return Ok(None);
        };
        self.assemble_bundle(&grant).await.map(Some)
    }

    /// Same projection as [`Self::get_filtered_records`], gated on `export`.
    pub async fn export_filtered_records(
        &self,
        secret: &str,
    ) -> Result<Option<RecordBundle>, AppError> {
        let Some(grant) = self.authorize(secret, Permission::Export) else {
            return Ok(None);
        };
        self.assemble_bundle(&grant).await.map(Some)
    }

    /// Latest health check report in `format`. `None` when the secret does
    /// not authorize viewing or no health check has run yet.
    pub async fn get_filtered_report(
        &self,
        secret: &str,
        format: ReportFormat,
    ) -> Result<Option<String>, AppError> {
        match self.lookup_report(secret, format).await? {
            ReportLookup::Rendered(report) => Ok(Some(report)),
            ReportLookup::Unauthorized | ReportLookup::NoReport => Ok(None),
        }
    }

    /// Like [`Self::get_filtered_report`], but tells a rejected secret apart
    /// from a missing health check result.
    pub async fn lookup_report(
        &self,
        secret: &str,
        format: ReportFormat,
    ) -> Result<ReportLookup, AppError> {
        if self.authorize(secret, Permission::View).is_none() {
            return Ok(ReportLookup::Unauthorized);
        }
        match self.health.latest().await {
            Some(latest) => self
                .reports
                .render(&latest, format)
                .map(ReportLookup::Rendered),
            None => Ok(ReportLookup::NoReport),
        }
    }

    /// Purge every grant past its expiry. Returns how many were removed.
    pub fn sweep_expired_grants(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();

        let expired: Vec<String> = state
            .grants
            .iter()
            .filter(|(_, grant)| grant.is_expired_at(now))
            .map(|(hash, _)| hash.clone())
            .collect();

        for hash in &expired {
            state.expire(hash, now);
        }

        state.revoked.retain(|_, expires_at| *expires_at > now);
        state.publish_active();

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Swept expired access grants");
        }

        expired.len()
    }

    /// Chronological snapshot of the audit trail.
    pub fn get_audit_log(&self) -> Vec<AuditEntry> {
        self.lock().audit.clone()
    }

    /// Live, unexpired grants ordered by issue time.
    pub fn list_active_grants(&self) -> Vec<GrantSummary> {
        let now = self.clock.now();
        let state = self.lock();

        let mut active: Vec<GrantSummary> = state
            .grants
            .values()
            .filter(|grant| !grant.is_expired_at(now))
            .map(|grant| GrantSummary::from_grant(grant, now))
            .collect();
        active.sort_by_key(|summary| summary.issued_at);
        active
    }

    /// Number of grants currently held, expired-but-unswept included.
    pub fn tracked_grant_count(&self) -> usize {
        self.lock().grants.len()
    }

    #[cfg(test)]
    fn insert_raw(&self, grant: AccessGrant) {
        self.lock().grants.insert(grant.secret_hash.clone(), grant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::clock::ManualClock;
    use crate::services::health_check::FarmRecordsHealthCheck;
    use crate::services::record_store::InMemoryRecordStore;
    use crate::services::report::StandardReportGenerator;

    fn authority(clock: Arc<ManualClock>) -> AccessTokenAuthority {
        let store = Arc::new(InMemoryRecordStore::new());
        let health = Arc::new(FarmRecordsHealthCheck::new(store.clone(), clock.clone()));
        AccessTokenAuthority::new(
            AuthorityConfig::default(),
            store,
            health,
            Arc::new(StandardReportGenerator),
        )
        .with_clock(clock)
    }

    fn vet() -> Subject {
        Subject::new("dr.jones@example.com", Role::Vet, &["goats", "health"])
    }

    #[test]
    fn test_duration_bounds_are_enforced() {
        let authority = authority(Arc::new(ManualClock::default()));

        for duration in [0, -5, 24 * 60 + 1] {
            let err = authority.issue_grant(vet(), [], duration).unwrap_err();
            assert!(matches!(err, AccessError::InvalidDuration { .. }));
        }
        assert!(authority.issue_grant(vet(), [], 24 * 60).is_ok());
        assert_eq!(authority.get_audit_log().len(), 1);
    }

    #[test]
    fn test_huge_ceiling_rejects_unrepresentable_expiry() {
        let store = Arc::new(InMemoryRecordStore::new());
        let clock = Arc::new(ManualClock::default());
        let health = Arc::new(FarmRecordsHealthCheck::new(store.clone(), clock.clone()));
        let authority = AccessTokenAuthority::new(
            AuthorityConfig {
                max_duration_minutes: i64::MAX,
                ..AuthorityConfig::default()
            },
            store,
            health,
            Arc::new(StandardReportGenerator),
        )
        .with_clock(clock);

        for duration in [1_000_000_000_000_000, i64::MAX] {
            let err = authority
                .issue_grant(vet(), [Permission::View], duration)
                .unwrap_err();
            assert!(matches!(err, AccessError::InvalidDuration { .. }));
        }

        // The state lock is still usable afterwards
        assert!(authority.issue_grant(vet(), [], 30).is_ok());
        assert_eq!(authority.tracked_grant_count(), 1);
    }

    #[test]
    fn test_revoking_an_unswept_expired_grant_records_expiry() {
        let clock = Arc::new(ManualClock::default());
        let authority = authority(clock.clone());
        let by_secret = authority.issue_grant(vet(), [], 10).unwrap();
        let by_id = authority.issue_grant(vet(), [], 10).unwrap();

        clock.advance(Duration::minutes(10));
        authority.revoke_grant(&by_secret.secret);
        assert!(!authority.revoke_grant_by_id(by_id.grant_id));

        let actions: Vec<AuditAction> = authority
            .get_audit_log()
            .iter()
            .skip(2)
            .map(|entry| entry.action)
            .collect();
        assert_eq!(
            actions,
            vec![AuditAction::TokenExpired, AuditAction::TokenExpired]
        );
        assert_eq!(authority.tracked_grant_count(), 0);
        assert!(authority.lock().revoked.is_empty());
    }

    struct UnavailableStore;

    #[async_trait::async_trait]
    impl RecordStore for UnavailableStore {
        async fn fetch(
            &self,
            collection: crate::models::Collection,
        ) -> Result<Vec<crate::models::Record>, AppError> {
            Err(AppError::InternalError(anyhow::anyhow!(
                "record store unavailable while reading {}",
                collection
            )))
        }
    }

    #[tokio::test]
    async fn test_record_store_failure_propagates() {
        let clock = Arc::new(ManualClock::default());
        let store: Arc<dyn RecordStore> = Arc::new(UnavailableStore);
        let health = Arc::new(FarmRecordsHealthCheck::new(store.clone(), clock.clone()));
        let authority = AccessTokenAuthority::new(
            AuthorityConfig::default(),
            store,
            health,
            Arc::new(StandardReportGenerator),
        )
        .with_clock(clock);

        let issued = authority.issue_grant(vet(), [], 30).unwrap();
        let err = authority
            .get_filtered_records(&issued.secret)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InternalError(_)));

        // A bad secret is still a plain rejection, not a store error
        assert!(authority
            .get_filtered_records("not-a-secret")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_permissions_default_to_view() {
        let authority = authority(Arc::new(ManualClock::default()));
        let issued = authority.issue_grant(vet(), [], 30).unwrap();

        assert!(authority.validate_grant(&issued.secret, Permission::View));
        assert!(!authority.validate_grant(&issued.secret, Permission::Export));
    }

    #[test]
    fn test_collision_retries_then_fails_loudly() {
        let authority =
            authority(Arc::new(ManualClock::default())).with_secret_generator(|| "fixed".into());

        authority.issue_grant(vet(), [], 30).unwrap();
        let err = authority.issue_grant(vet(), [], 30).unwrap_err();

        assert!(matches!(err, AccessError::SecretCollision(MAX_SECRET_ATTEMPTS)));
        assert_eq!(authority.tracked_grant_count(), 1);
        assert_eq!(authority.get_audit_log().len(), 1);
    }

    #[test]
    fn test_reinserted_revoked_grant_never_validates() {
        let authority = authority(Arc::new(ManualClock::default()));
        let issued = authority.issue_grant(vet(), [], 30).unwrap();

        let grant = {
            let state = authority.lock();
            state.grants.values().next().cloned().unwrap()
        };

        authority.revoke_grant(&issued.secret);
        authority.insert_raw(grant);

        assert!(!authority.validate_grant(&issued.secret, Permission::View));
        assert_eq!(authority.tracked_grant_count(), 0);
    }

    #[test]
    fn test_reinserted_expired_grant_never_validates() {
        let clock = Arc::new(ManualClock::default());
        let authority = authority(clock.clone());
        let issued = authority.issue_grant(vet(), [], 10).unwrap();

        let grant = {
            let state = authority.lock();
            state.grants.values().next().cloned().unwrap()
        };

        clock.advance(Duration::minutes(11));
        assert_eq!(authority.sweep_expired_grants(), 1);
        authority.insert_raw(grant);

        assert!(!authority.validate_grant(&issued.secret, Permission::View));
    }

    #[test]
    fn test_sweep_prunes_stale_tombstones() {
        let clock = Arc::new(ManualClock::default());
        let authority = authority(clock.clone());
        let issued = authority.issue_grant(vet(), [], 10).unwrap();

        authority.revoke_grant(&issued.secret);
        assert_eq!(authority.lock().revoked.len(), 1);

        clock.advance(Duration::minutes(10));
        authority.sweep_expired_grants();
        assert!(authority.lock().revoked.is_empty());
    }

    #[test]
    fn test_denied_audit_can_be_disabled() {
        let store = Arc::new(InMemoryRecordStore::new());
        let clock = Arc::new(ManualClock::default());
        let health = Arc::new(FarmRecordsHealthCheck::new(store.clone(), clock.clone()));
        let authority = AccessTokenAuthority::new(
            AuthorityConfig {
                audit_permission_denied: false,
                ..AuthorityConfig::default()
            },
            store,
            health,
            Arc::new(StandardReportGenerator),
        )
        .with_clock(clock);

        let issued = authority.issue_grant(vet(), [Permission::View], 30).unwrap();
        assert!(!authority.validate_grant(&issued.secret, Permission::Export));

        let log = authority.get_audit_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, AuditAction::TokenCreated);
    }

    #[test]
    fn test_audit_never_contains_secret() {
        let authority = authority(Arc::new(ManualClock::default()));
        let issued = authority.issue_grant(vet(), [], 30).unwrap();
        authority.validate_grant(&issued.secret, Permission::View);
        authority.revoke_grant(&issued.secret);

        for entry in authority.get_audit_log() {
            assert!(!entry.details.contains(&issued.secret));
            assert!(!entry.subject.contains(&issued.secret));
        }
    }
}
