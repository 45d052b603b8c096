//! Test helpers for farm-access-service integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{TimeZone, Utc};
use farm_access_service::{
    build_router,
    config::{Environment, FarmAccessConfig, GrantConfig, RecordsConfig, SecurityConfig},
    services::{AccessTokenAuthority, InMemoryRecordStore, ManualClock},
    AppState,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_ADMIN_API_KEY: &str = "test-admin-key-12345";

/// One or two records per collection, with every field any role can see plus
/// some no role can see.
pub fn farm_fixture() -> Value {
    json!({
        "goats": [
            {
                "id": "g1", "name": "Clover", "earTag": "MG-001", "breed": "Nubian",
                "gender": "doe", "dateOfBirth": "2021-03-14", "weight": 61.5,
                "status": "active", "purchasePrice": 450, "ownerNotes": "favourite"
            },
            {
                "id": "g2", "name": "Bramble", "earTag": "MG-002", "breed": "Alpine",
                "gender": "buck", "dateOfBirth": "2020-05-02", "weight": 78.0,
                "status": "active", "purchasePrice": 600
            }
        ],
        "healthRecords": [
            {
                "id": "h1", "goatId": "g1", "date": "2024-05-01", "type": "vaccination",
                "description": "CDT booster", "treatment": "injection",
                "medication": "CDT", "dosage": "2ml", "veterinarian": "Dr. Jones",
                "notes": "no reaction", "nextDueDate": "2025-05-01", "cost": 35
            }
        ],
        "breedingRecords": [
            {
                "id": "b1", "doeId": "g1", "buckId": "g2", "breedingDate": "2024-01-10",
                "expectedKiddingDate": "2024-06-08", "actualKiddingDate": null,
                "kidsCount": 2, "notes": "twins expected"
            }
        ],
        "feedRecords": [
            {
                "id": "f1", "goatId": "g1", "date": "2024-05-20", "feedType": "alfalfa",
                "quantity": 3, "unit": "kg", "cost": 4.2, "supplier": "Valley Feed"
            }
        ],
        "transactions": [
            {
                "id": "t1", "date": "2024-05-02", "type": "expense", "category": "feed",
                "amount": 120, "description": "hay", "accountNumber": "12-3456"
            }
        ],
        "sales": [
            {
                "id": "s1", "date": "2024-05-03", "productId": "p1", "quantity": 10,
                "unitPrice": 6, "total": 60, "customerId": "c1"
            }
        ],
        "products": [
            { "id": "p1", "name": "Goat milk soap", "category": "soap", "price": 6, "stock": 40, "margin": 0.6 }
        ],
        "contacts": [
            { "id": "c1", "name": "Sam Buyer", "phone": "555-0100", "email": "sam@example.com" }
        ]
    })
}

pub fn test_config() -> FarmAccessConfig {
    FarmAccessConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "farm-access-service".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        security: SecurityConfig {
            admin_api_key: Secret::new(TEST_ADMIN_API_KEY.to_string()),
            allowed_origins: vec!["http://allowed.example".to_string()],
            access_rate_limit_per_minute: 1000,
        },
        grants: GrantConfig::default(),
        records: RecordsConfig::default(),
    }
}

/// Router plus the hand-driven clock behind it.
pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_records(farm_fixture())
    }

    pub fn with_records(records: Value) -> Self {
        Self::with_config(test_config(), records)
    }

    pub fn with_config(config: FarmAccessConfig, records: Value) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(InMemoryRecordStore::from_json(records).unwrap());
        let state = AppState::new(config, store, clock.clone());
        let router = build_router(state.clone());
        Self {
            state,
            clock,
            router,
        }
    }

    pub fn authority(&self) -> &Arc<AccessTokenAuthority> {
        &self.state.authority
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> Response<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-Admin-Api-Key", TEST_ADMIN_API_KEY);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn bearer(&self, uri: &str, secret: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", secret))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Issue a grant over HTTP and return its secret.
    pub async fn issue(&self, grant: Value) -> String {
        let response = self.admin("POST", "/grants", Some(grant)).await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        let body = json_body(response).await;
        body["secret"].as_str().unwrap().to_string()
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn json_body(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn text_body(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
