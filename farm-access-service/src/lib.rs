pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use axum::{
    extract::MatchedPath,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::FarmAccessConfig;
use crate::services::{
    AccessTokenAuthority, Clock, FarmRecordsHealthCheck, RecordStore, StandardReportGenerator,
};

#[derive(Clone)]
pub struct AppState {
    pub config: FarmAccessConfig,
    pub authority: Arc<AccessTokenAuthority>,
    pub health_check: Arc<FarmRecordsHealthCheck>,
    pub access_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the authority and its collaborators over `records`.
    pub fn new(
        config: FarmAccessConfig,
        records: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let health_check = Arc::new(FarmRecordsHealthCheck::new(records.clone(), clock.clone()));
        let authority = Arc::new(
            AccessTokenAuthority::new(
                config.grants.authority_config(),
                records,
                health_check.clone(),
                Arc::new(StandardReportGenerator),
            )
            .with_clock(clock),
        );
        let access_rate_limiter =
            create_ip_rate_limiter(config.security.access_rate_limit_per_minute, 60);

        Self {
            config,
            authority,
            health_check,
            access_rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Admin routes
    let admin_routes = Router::new()
        .route(
            "/grants",
            post(handlers::create_grant).get(handlers::list_grants),
        )
        .route("/grants/by-id/:grant_id", delete(handlers::revoke_grant_by_id))
        .route("/grants/:secret", delete(handlers::revoke_grant))
        .route("/audit-log", get(handlers::get_audit_log))
        .route("/health-checks", post(handlers::run_health_check))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    // Grant holder routes, rate limited per IP to slow down secret guessing
    let access_limiter = state.access_rate_limiter.clone();
    let access_routes = Router::new()
        .route("/access/records", get(handlers::get_records))
        .route("/access/records/export", get(handlers::export_records))
        .route("/access/report", get(handlers::get_report))
        .layer(from_fn_with_state(access_limiter, ip_rate_limit_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(admin_routes)
        .merge(access_routes)
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        // Span carries the route template, never the raw URI: secrets travel in paths
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            let route = request
                .extensions()
                .get::<MatchedPath>()
                .map(|path| path.as_str())
                .unwrap_or("unmatched");

            tracing::info_span!(
                "http_request",
                request_id = %request_id,
                method = %request.method(),
                route = %route,
                version = ?request.version(),
            )
        }))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|o| match o.parse::<HeaderValue>() {
                            Ok(origin) => Some(origin),
                            Err(e) => {
                                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                                None
                            }
                        })
                        .collect::<Vec<HeaderValue>>(),
                )
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static("x-admin-api-key"),
                    HeaderName::from_static("x-request-id"),
                ]),
        )
}
