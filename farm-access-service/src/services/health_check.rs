//! Farm record health checks.
//!
//! Runs data-quality rules over the record store and keeps the most recent
//! result, which the access authority surfaces to grant holders and the
//! report generator renders.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::models::{Collection, HealthCheckResult, HealthIssue, Record, Severity};
use crate::services::clock::Clock;
use crate::services::record_store::RecordStore;

/// Oldest plausible goat age, in years.
pub const MAX_GOAT_AGE_YEARS: i32 = 20;

/// Provider of the most recent health check result.
#[async_trait]
pub trait HealthCheckSource: Send + Sync {
    async fn latest(&self) -> Option<HealthCheckResult>;
}

/// Health check over the farm record store.
pub struct FarmRecordsHealthCheck {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    latest: Mutex<Option<HealthCheckResult>>,
}

impl FarmRecordsHealthCheck {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            latest: Mutex::new(None),
        }
    }

    /// Run every rule and remember the result as the latest.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<HealthCheckResult, AppError> {
        let goats = self.store.fetch(Collection::Goats).await?;
        let health = self.store.fetch(Collection::HealthRecords).await?;
        let breeding = self.store.fetch(Collection::BreedingRecords).await?;
        let feed = self.store.fetch(Collection::FeedRecords).await?;

        let now = self.clock.now();
        let mut issues = Vec::new();

        check_ear_tags(&goats, &mut issues);
        check_ages(&goats, now, &mut issues);

        let goat_ids: HashSet<String> = goats.iter().filter_map(|g| field_str(g, "id")).collect();
        check_references(&health, Collection::HealthRecords, &["goatId"], &goat_ids, &mut issues);
        check_references(
            &breeding,
            Collection::BreedingRecords,
            &["doeId", "buckId"],
            &goat_ids,
            &mut issues,
        );
        check_references(&feed, Collection::FeedRecords, &["goatId"], &goat_ids, &mut issues);

        let result = HealthCheckResult {
            checked_at: now,
            records_checked: goats.len() + health.len() + breeding.len() + feed.len(),
            issues,
        };

        tracing::info!(
            records_checked = result.records_checked,
            errors = result.error_count(),
            warnings = result.warning_count(),
            "Farm record health check completed"
        );

        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(result.clone());
        Ok(result)
    }
}

#[async_trait]
impl HealthCheckSource for FarmRecordsHealthCheck {
    async fn latest(&self) -> Option<HealthCheckResult> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Record field as a string; numeric ids are stringified.
fn field_str(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn check_ear_tags(goats: &[Record], issues: &mut Vec<HealthIssue>) {
    let mut first_seen: HashMap<String, Option<String>> = HashMap::new();

    for goat in goats {
        let id = field_str(goat, "id");
        let Some(tag) = field_str(goat, "earTag") else {
            issues.push(HealthIssue {
                severity: Severity::Warning,
                rule: "missing_ear_tag".to_string(),
                collection: Collection::Goats,
                record_id: id,
                message: "Goat has no ear tag".to_string(),
            });
            continue;
        };

        let key = tag.to_uppercase();
        match first_seen.get(&key) {
            Some(original) => issues.push(HealthIssue {
                severity: Severity::Error,
                rule: "duplicate_ear_tag".to_string(),
                collection: Collection::Goats,
                record_id: id,
                message: format!(
                    "Ear tag {} already used by goat {}",
                    tag,
                    original.as_deref().unwrap_or("(unknown id)")
                ),
            }),
            None => {
                first_seen.insert(key, id);
            }
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn check_ages(goats: &[Record], now: DateTime<Utc>, issues: &mut Vec<HealthIssue>) {
    let today = now.date_naive();

    for goat in goats {
        let Some(raw) = field_str(goat, "dateOfBirth") else {
            continue;
        };
        let id = field_str(goat, "id");

        let message = match parse_date(&raw) {
            None => Some(format!("Unreadable date of birth: {}", raw)),
            Some(born) if born > today => Some(format!("Date of birth {} is in the future", born)),
            Some(born) => {
                let mut age = today.year() - born.year();
                if (today.month(), today.day()) < (born.month(), born.day()) {
                    age -= 1;
                }
                (age > MAX_GOAT_AGE_YEARS).then(|| {
                    format!(
                        "Age of {} years exceeds {} years",
                        age, MAX_GOAT_AGE_YEARS
                    )
                })
            }
        };

        if let Some(message) = message {
            issues.push(HealthIssue {
                severity: Severity::Warning,
                rule: "age_out_of_range".to_string(),
                collection: Collection::Goats,
                record_id: id,
                message,
            });
        }
    }
}

fn check_references(
    records: &[Record],
    collection: Collection,
    reference_fields: &[&str],
    goat_ids: &HashSet<String>,
    issues: &mut Vec<HealthIssue>,
) {
    for record in records {
        for field in reference_fields {
            let Some(goat_id) = field_str(record, field) else {
                continue;
            };
            if !goat_ids.contains(&goat_id) {
                issues.push(HealthIssue {
                    severity: Severity::Warning,
                    rule: "orphaned_record".to_string(),
                    collection,
                    record_id: field_str(record, "id"),
                    message: format!("{} references unknown goat {}", field, goat_id),
                });
            }
        }
    }
}
