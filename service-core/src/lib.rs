//! service-core: Shared infrastructure for the farm access services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
