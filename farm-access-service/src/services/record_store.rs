//! Read-only access to the farm's underlying records.

use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use std::path::Path;

use crate::models::{Collection, Record};

/// Source of farm records. The access service never writes to it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records of `collection`, in store order.
    async fn fetch(&self, collection: Collection) -> Result<Vec<Record>, AppError>;
}

/// Record store held in memory, optionally loaded from a JSON fixture of the
/// form `{ "goats": [ {...}, ... ], "healthRecords": [...], ... }`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    collections: HashMap<Collection, Vec<Record>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, collection: Collection, records: Vec<Record>) -> Self {
        self.collections.insert(collection, records);
        self
    }

    /// Build from a JSON document keyed by collection name. Unknown keys are
    /// ignored; every known key must hold an array of objects.
    pub fn from_json(value: serde_json::Value) -> Result<Self, AppError> {
        let root = value.as_object().ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("Record fixture must be a JSON object"))
        })?;

        let mut store = Self::new();
        for (name, records) in root {
            let Some(collection) = Collection::parse(name) else {
                tracing::warn!(collection = %name, "Ignoring unknown collection in record fixture");
                continue;
            };

            let records = records
                .as_array()
                .ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "Collection '{}' must be an array",
                        name
                    ))
                })?
                .iter()
                .map(|record| {
                    record.as_object().cloned().ok_or_else(|| {
                        AppError::ConfigError(anyhow::anyhow!(
                            "Collection '{}' contains a non-object record",
                            name
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            store.collections.insert(collection, records);
        }

        Ok(store)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to read record fixture {}: {}",
                path.display(),
                e
            ))
        })?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to parse record fixture {}: {}",
                path.display(),
                e
            ))
        })?;

        let store = Self::from_json(value)?;
        tracing::info!(
            path = %path.display(),
            records = store.len(),
            "Loaded record fixture"
        );
        Ok(store)
    }

    /// Total number of records across all collections.
    pub fn len(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch(&self, collection: Collection) -> Result<Vec<Record>, AppError> {
        Ok(self
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_from_json_loads_known_collections() {
        let store = InMemoryRecordStore::from_json(json!({
            "goats": [{"id": "g1"}, {"id": "g2"}],
            "sales": [],
            "weather": [{"id": "w1"}]
        }))
        .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.fetch(Collection::Goats).await.unwrap().len(), 2);
        assert!(store.fetch(Collection::Contacts).await.unwrap().is_empty());
    }

    #[test]
    fn test_from_json_rejects_non_object_records() {
        let result = InMemoryRecordStore::from_json(json!({ "goats": [1, 2] }));
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_from_json_file_reads_fixture() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"products": [{{"id": "p1", "name": "Chevre"}}]}}"#).unwrap();

        let store = InMemoryRecordStore::from_json_file(file.path()).unwrap();
        assert_eq!(store.len(), 1);
    }
}
