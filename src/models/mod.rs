//! # Data Models
//!
//! Input/output records of the member activity job and the execution
//! metadata the engine persists about each run.
//!
//! - [`member`] - input record read page by page
//! - [`activity`] - output record upserted by member id
//! - [`page_cursor`] - reader position and restart checkpoint
//! - [`job_parameters`] - launch parameters
//! - [`execution`] - job/step execution records and counters

pub mod activity;
pub mod execution;
pub mod job_parameters;
pub mod member;
pub mod page_cursor;

pub use activity::Activity;
pub use execution::{ExecutionCounters, JobExecution, NewJobExecution, StepExecution};
pub use job_parameters::{JobParameter, JobParameters};
pub use member::Member;
pub use page_cursor::PageCursor;
