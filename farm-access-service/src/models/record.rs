//! Farm records as handed out by the record store, and the filtered bundle
//! returned to grant holders.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::role::Collection;

/// Flat field-name to scalar-value record.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Permission-filtered view of farm records for one grant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBundle {
    /// Only collections with at least one permitted field appear here.
    #[serde(flatten)]
    pub collections: BTreeMap<Collection, Vec<Record>>,
    /// Timestamp of the most recent farm health check. Not field-filtered.
    pub last_health_check: Option<DateTime<Utc>>,
}

impl RecordBundle {
    pub fn get(&self, collection: Collection) -> Option<&Vec<Record>> {
        self.collections.get(&collection)
    }

    pub fn contains(&self, collection: Collection) -> bool {
        self.collections.contains_key(&collection)
    }
}

/// Keep only `permitted` fields of `record`, in permitted order. Fields the
/// record does not carry are not invented.
pub fn project(record: &Record, permitted: &[&str]) -> Record {
    permitted
        .iter()
        .filter_map(|field| {
            record
                .get(*field)
                .map(|value| ((*field).to_string(), value.clone()))
        })
        .collect()
}
