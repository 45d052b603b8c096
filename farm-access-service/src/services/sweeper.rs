//! Periodic purge of expired grants that are never presented again.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::services::authority::AccessTokenAuthority;

/// Background task running [`AccessTokenAuthority::sweep_expired_grants`] on
/// a fixed interval. Ticks never overlap; a late tick is skipped.
pub struct GrantSweeper {
    shutdown_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl GrantSweeper {
    pub fn spawn(authority: Arc<AccessTokenAuthority>, every: Duration) -> Self {
        let shutdown_token = CancellationToken::new();
        let shutdown = shutdown_token.clone();

        tracing::info!(interval_secs = every.as_secs(), "Starting grant sweeper");

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Grant sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let removed = authority.sweep_expired_grants();
                        tracing::debug!(removed, "Grant sweep completed");
                    }
                }
            }
        });

        Self {
            shutdown_token,
            handle,
        }
    }

    /// Stop the sweeper and wait for the task to finish.
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("Grant sweeper task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditAction, Role, Subject};
    use crate::services::authority::AuthorityConfig;
    use crate::services::clock::ManualClock;
    use crate::services::health_check::FarmRecordsHealthCheck;
    use crate::services::record_store::InMemoryRecordStore;
    use crate::services::report::StandardReportGenerator;

    #[tokio::test]
    async fn test_sweeper_purges_and_stops() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(InMemoryRecordStore::new());
        let health = Arc::new(FarmRecordsHealthCheck::new(store.clone(), clock.clone()));
        let authority = Arc::new(
            AccessTokenAuthority::new(
                AuthorityConfig::default(),
                store,
                health,
                Arc::new(StandardReportGenerator),
            )
            .with_clock(clock.clone()),
        );

        authority
            .issue_grant(
                Subject::new("inspector@example.com", Role::Inspector, &["goats"]),
                [],
                5,
            )
            .unwrap();
        clock.advance(chrono::Duration::minutes(6));

        let sweeper = GrantSweeper::spawn(authority.clone(), Duration::from_millis(10));

        let mut purged = false;
        for _ in 0..100 {
            if authority.tracked_grant_count() == 0 {
                purged = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sweeper.shutdown().await;

        assert!(purged);
        let log = authority.get_audit_log();
        assert_eq!(log.last().map(|e| e.action), Some(AuditAction::TokenExpired));
    }
}
