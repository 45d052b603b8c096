pub mod access;
pub mod audit;
pub mod grants;
pub mod health;
pub mod health_checks;
pub mod metrics;

pub use access::{export_records, get_records, get_report};
pub use audit::get_audit_log;
pub use grants::{create_grant, list_grants, revoke_grant, revoke_grant_by_id};
pub use health::health_check;
pub use health_checks::run_health_check;
