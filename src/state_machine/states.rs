use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution status shared by job and step executions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Execution record created, processing not begun
    #[default]
    Starting,
    /// Chunks are being read, processed and committed
    Started,
    /// Source exhausted and every chunk committed
    Completed,
    /// A read or commit failed; committed chunks remain
    Failed,
    /// Stopped on request after the in-flight commit finished
    Stopped,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 5] = [
        Self::Starting,
        Self::Started,
        Self::Completed,
        Self::Failed,
        Self::Stopped,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Check if this state counts against the single-flight launch guard
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Started)
    }

    /// Whether a finished execution may hand its checkpoint to the next launch
    pub fn is_restartable(&self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }

    pub fn can_transition_to(&self, target: BatchStatus) -> bool {
        matches!(
            (self, target),
            (Self::Starting, Self::Started)
                | (Self::Starting, Self::Failed)
                | (Self::Starting, Self::Stopped)
                | (Self::Started, Self::Completed)
                | (Self::Started, Self::Failed)
                | (Self::Started, Self::Stopped)
        )
    }

    /// States from which `target` is reachable in one transition
    pub fn predecessors(target: BatchStatus) -> Vec<BatchStatus> {
        Self::ALL
            .into_iter()
            .filter(|state| state.can_transition_to(target))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTING" => Ok(Self::Starting),
            "STARTED" => Ok(Self::Started),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "STOPPED" => Ok(Self::Stopped),
            _ => Err(format!("Invalid batch status: {s}")),
        }
    }
}
