// State machine module for job and step executions
//
// Both execution records share one status enum; the job state machine owns
// the transition table and the repositories re-check it on every write.

pub mod errors;
pub mod events;
pub mod job_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::JobEvent;
pub use job_state_machine::JobStateMachine;
pub use states::BatchStatus;
