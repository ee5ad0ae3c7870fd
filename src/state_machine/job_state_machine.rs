use uuid::Uuid;

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::JobEvent,
    states::BatchStatus,
};

/// In-process lifecycle tracker for one job execution.
///
/// The executor drives this machine and persists each accepted transition
/// through the job repository; the repository re-validates the transition
/// against the stored status so a stale machine cannot resurrect a finished run.
#[derive(Debug, Clone)]
pub struct JobStateMachine {
    job_execution_id: Uuid,
    state: BatchStatus,
}

impl JobStateMachine {
    pub fn new(job_execution_id: Uuid, state: BatchStatus) -> Self {
        Self {
            job_execution_id,
            state,
        }
    }

    pub fn current_state(&self) -> BatchStatus {
        self.state
    }

    pub fn job_execution_id(&self) -> Uuid {
        self.job_execution_id
    }

    /// Attempt to transition the execution state
    pub fn transition(&mut self, event: &JobEvent) -> StateMachineResult<BatchStatus> {
        let target = Self::determine_target_state(self.state, event)?;

        tracing::debug!(
            job_execution_id = %self.job_execution_id,
            from = %self.state,
            to = %target,
            event = event.event_type(),
            "Job state transition"
        );

        self.state = target;
        Ok(target)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: BatchStatus,
        event: &JobEvent,
    ) -> StateMachineResult<BatchStatus> {
        let target = match (current_state, event) {
            (BatchStatus::Starting, JobEvent::Start) => BatchStatus::Started,

            (BatchStatus::Started, JobEvent::Complete) => BatchStatus::Completed,

            (BatchStatus::Starting | BatchStatus::Started, JobEvent::Fail(_)) => {
                BatchStatus::Failed
            }

            (BatchStatus::Starting | BatchStatus::Started, JobEvent::Stop) => {
                BatchStatus::Stopped
            }

            (from, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from,
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut sm = JobStateMachine::new(Uuid::new_v4(), BatchStatus::Starting);

        assert_eq!(sm.transition(&JobEvent::Start).unwrap(), BatchStatus::Started);
        assert_eq!(
            sm.transition(&JobEvent::Complete).unwrap(),
            BatchStatus::Completed
        );
        assert!(sm.is_terminal());
    }

    #[test]
    fn test_failure_and_stop_transitions() {
        assert_eq!(
            JobStateMachine::determine_target_state(
                BatchStatus::Started,
                &JobEvent::failed("commit failed")
            )
            .unwrap(),
            BatchStatus::Failed
        );
        assert_eq!(
            JobStateMachine::determine_target_state(BatchStatus::Starting, &JobEvent::Stop)
                .unwrap(),
            BatchStatus::Stopped
        );
    }

    #[test]
    fn test_invalid_transitions() {
        // Cannot complete before starting
        assert!(
            JobStateMachine::determine_target_state(BatchStatus::Starting, &JobEvent::Complete)
                .is_err()
        );

        // Terminal states are final
        for terminal in [BatchStatus::Completed, BatchStatus::Failed, BatchStatus::Stopped] {
            for event in [
                JobEvent::Start,
                JobEvent::Complete,
                JobEvent::Fail("x".to_string()),
                JobEvent::Stop,
            ] {
                assert!(JobStateMachine::determine_target_state(terminal, &event).is_err());
            }
        }
    }

    #[test]
    fn test_rejected_transition_keeps_state() {
        let mut sm = JobStateMachine::new(Uuid::new_v4(), BatchStatus::Completed);
        let err = sm.transition(&JobEvent::Start).unwrap_err();

        assert_eq!(
            err,
            StateMachineError::InvalidTransition {
                from: BatchStatus::Completed,
                event: "start".to_string(),
            }
        );
        assert_eq!(sm.current_state(), BatchStatus::Completed);
    }

    #[test]
    fn test_table_agrees_with_status_graph() {
        let events = [
            JobEvent::Start,
            JobEvent::Complete,
            JobEvent::Fail("x".to_string()),
            JobEvent::Stop,
        ];
        for from in BatchStatus::ALL {
            for event in &events {
                if let Ok(to) = JobStateMachine::determine_target_state(from, event) {
                    assert!(from.can_transition_to(to), "{from} -> {to}");
                }
            }
        }
    }
}
