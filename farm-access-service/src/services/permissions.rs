//! Role-based field visibility table.
//!
//! Static for the life of the process. The match is exhaustive over
//! `(Role, Collection)` so every pair has an entry; an empty slice means the
//! role sees nothing of that collection.

use crate::models::{Collection, Role};

const GOAT_FIELDS_FULL: &[&str] = &[
    "id",
    "name",
    "earTag",
    "breed",
    "gender",
    "dateOfBirth",
    "weight",
    "status",
];

const NONE: &[&str] = &[];

/// Fields of `collection` that members of `role` may see, in output order.
pub fn permitted_fields(role: Role, collection: Collection) -> &'static [&'static str] {
    use Collection::*;

    match (role, collection) {
        (Role::Vet, Goats) => GOAT_FIELDS_FULL,
        (Role::Vet, HealthRecords) => &[
            "id",
            "goatId",
            "date",
            "type",
            "description",
            "treatment",
            "medication",
            "dosage",
            "veterinarian",
            "notes",
            "nextDueDate",
        ],
        (Role::Vet, BreedingRecords) => &[
            "id",
            "doeId",
            "buckId",
            "breedingDate",
            "expectedKiddingDate",
            "actualKiddingDate",
            "kidsCount",
            "notes",
        ],
        (Role::Vet, FeedRecords) => &["id", "goatId", "date", "feedType", "quantity", "unit"],
        (Role::Vet, Transactions | Sales | Products | Contacts) => NONE,

        (Role::Consultant, Goats) => GOAT_FIELDS_FULL,
        (Role::Consultant, HealthRecords) => &["id", "goatId", "date", "type", "description"],
        (Role::Consultant, BreedingRecords) => &[
            "id",
            "doeId",
            "buckId",
            "breedingDate",
            "expectedKiddingDate",
            "kidsCount",
        ],
        (Role::Consultant, FeedRecords) => {
            &["id", "date", "feedType", "quantity", "unit", "cost"]
        }
        (Role::Consultant, Transactions) => {
            &["id", "date", "type", "category", "amount", "description"]
        }
        (Role::Consultant, Sales) => &["id", "date", "productId", "quantity", "unitPrice", "total"],
        (Role::Consultant, Products) => &["id", "name", "category", "price", "stock"],
        (Role::Consultant, Contacts) => NONE,

        (Role::Inspector, Goats) => &["id", "name", "earTag", "breed", "gender"],
        (Role::Inspector, HealthRecords) => {
            &["id", "goatId", "date", "type", "treatment", "medication"]
        }
        (Role::Inspector, FeedRecords) => &["id", "date", "feedType", "quantity"],
        (Role::Inspector, Products) => &["id", "name", "category"],
        (Role::Inspector, BreedingRecords | Transactions | Sales | Contacts) => NONE,

        (Role::Unrecognized, _) => NONE,
    }
}
