//! # System Constants
//!
//! Names, defaults and limits that define the operational boundaries of the
//! member batch engine.

// Re-export state types for convenience
pub use crate::state_machine::BatchStatus;

/// Job and step identities
pub mod jobs {
    /// The logical job name every trigger launches
    pub const MEMBER_ACTIVITY_JOB: &str = "memberActivityJob";
    /// The single read-process-write step of the member activity job
    pub const MEMBER_STEP: &str = "memberStep";
}

/// Launch parameter names
pub mod parameters {
    /// Distinguishing parameter added by the fixed-rate scheduler
    pub const SCHEDULED_TIME: &str = "time";
    /// Distinguishing parameter added by the manual trigger endpoint
    pub const MANUAL_RUN_TIME: &str = "manualRunTime";
}

/// Member and activity record values
pub mod records {
    /// Primary status a member must carry to be read at all
    pub const QUALIFYING_STATUS: &str = "active";
    /// Secondary (policy) status a member must carry to produce an activity
    pub const ACTIVE_POLICY_STATUS: &str = "active";
    /// Label written on every activity record
    pub const DEFAULT_ACTION: &str = "Policy check";
}

/// Engine defaults and limits
pub mod system {
    pub const DEFAULT_CHUNK_SIZE: usize = 10;
    pub const MAX_CHUNK_SIZE: usize = 10_000;
    pub const DEFAULT_PAGE_SIZE: usize = 100;
    pub const MAX_PAGE_SIZE: usize = 10_000;
    /// 15 minutes between scheduled launches
    pub const DEFAULT_SCHEDULE_PERIOD_SECONDS: u64 = 900;
    pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
    pub const DEFAULT_HISTORY_LIMIT: usize = 20;
    pub const MAX_HISTORY_LIMIT: usize = 500;
}

/// Default collection (table) names
pub mod collections {
    pub const MEMBERS: &str = "members";
    pub const ACTIVITIES: &str = "activities";
    pub const JOB_EXECUTIONS: &str = "batch_job_executions";
    pub const STEP_EXECUTIONS: &str = "batch_step_executions";
}

/// One-line responses of the manual trigger endpoint
pub mod messages {
    pub const TRIGGER_SUCCESS: &str = "Batch job triggered successfully.";
    pub const TRIGGER_FAILURE_PREFIX: &str = "Failed to trigger batch job: ";
    /// Exit message recorded on runs found active at process start
    pub const INTERRUPTED_BY_RESTART: &str = "interrupted by process restart";
    pub const STOPPED_BY_REQUEST: &str = "stopped on request";
}
