//! Closed vocabularies for external access: roles, data types, collections
//! and capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External party category. Determines which fields of which collections a
/// grant holder can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Vet,
    Consultant,
    Inspector,
    /// Any role string we do not know. Sees nothing.
    #[serde(other)]
    Unrecognized,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Vet => "vet",
            Role::Consultant => "consultant",
            Role::Inspector => "inspector",
            Role::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of farm data a subject asks to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Goats,
    Health,
    Breeding,
    Feed,
    Financial,
    Products,
    Contacts,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Goats => "goats",
            DataType::Health => "health",
            DataType::Breeding => "breeding",
            DataType::Feed => "feed",
            DataType::Financial => "financial",
            DataType::Products => "products",
            DataType::Contacts => "contacts",
        }
    }

    /// Record collections backing this data type.
    pub fn collections(&self) -> &'static [Collection] {
        match self {
            DataType::Goats => &[Collection::Goats],
            DataType::Health => &[Collection::HealthRecords],
            DataType::Breeding => &[Collection::BreedingRecords],
            DataType::Feed => &[Collection::FeedRecords],
            DataType::Financial => &[Collection::Transactions, Collection::Sales],
            DataType::Products => &[Collection::Products],
            DataType::Contacts => &[Collection::Contacts],
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "goats" => Ok(DataType::Goats),
            "health" => Ok(DataType::Health),
            "breeding" => Ok(DataType::Breeding),
            "feed" => Ok(DataType::Feed),
            "financial" => Ok(DataType::Financial),
            "products" => Ok(DataType::Products),
            "contacts" => Ok(DataType::Contacts),
            other => Err(format!("unknown data type: {}", other)),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named record sequence in the farm record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Goats,
    HealthRecords,
    BreedingRecords,
    FeedRecords,
    Transactions,
    Sales,
    Products,
    Contacts,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Goats,
        Collection::HealthRecords,
        Collection::BreedingRecords,
        Collection::FeedRecords,
        Collection::Transactions,
        Collection::Sales,
        Collection::Products,
        Collection::Contacts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Goats => "goats",
            Collection::HealthRecords => "healthRecords",
            Collection::BreedingRecords => "breedingRecords",
            Collection::FeedRecords => "feedRecords",
            Collection::Transactions => "transactions",
            Collection::Sales => "sales",
            Collection::Products => "products",
            Collection::Contacts => "contacts",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability carried by a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    View,
    Export,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Export => "export",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_role_deserializes_to_fallback() {
        let role: Role = serde_json::from_str("\"farrier\"").unwrap();
        assert_eq!(role, Role::Unrecognized);

        let role: Role = serde_json::from_str("\"vet\"").unwrap();
        assert_eq!(role, Role::Vet);
    }

    #[test]
    fn test_financial_expands_to_transactions_and_sales() {
        assert_eq!(
            DataType::Financial.collections(),
            &[Collection::Transactions, Collection::Sales]
        );
    }

    #[test]
    fn test_data_type_parse_rejects_unknown() {
        assert_eq!("Health".parse::<DataType>(), Ok(DataType::Health));
        assert!("weather".parse::<DataType>().is_err());
    }

    #[test]
    fn test_collection_names_round_trip_through_parse() {
        for collection in Collection::ALL {
            assert_eq!(Collection::parse(collection.as_str()), Some(collection));
        }
        assert_eq!(
            serde_json::to_string(&Collection::HealthRecords).unwrap(),
            "\"healthRecords\""
        );
    }

    #[test]
    fn test_unknown_permission_is_rejected() {
        assert!(serde_json::from_str::<Permission>("\"delete\"").is_err());
    }
}
