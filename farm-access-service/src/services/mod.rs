pub mod authority;
pub mod clock;
pub mod health_check;
pub mod permissions;
pub mod record_store;
pub mod report;
pub mod secret;
pub mod sweeper;

pub use authority::{
    AccessError, AccessTokenAuthority, AuthorityConfig, ReportLookup, DURATION_CEILING_MINUTES,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use health_check::{FarmRecordsHealthCheck, HealthCheckSource};
pub use permissions::permitted_fields;
pub use record_store::{InMemoryRecordStore, RecordStore};
pub use report::{ReportGenerator, StandardReportGenerator};
pub use sweeper::GrantSweeper;
