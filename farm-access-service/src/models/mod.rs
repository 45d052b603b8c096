pub mod audit;
pub mod grant;
pub mod health_check;
pub mod record;
pub mod role;

pub use audit::{AuditAction, AuditEntry};
pub use grant::{
    AccessGrant, CreateGrantRequest, GrantStatus, GrantSummary, IssuedGrant, Subject,
};
pub use health_check::{HealthCheckResult, HealthIssue, ReportFormat, Severity};
pub use record::{project, Record, RecordBundle};
pub use role::{Collection, DataType, Permission, Role};
