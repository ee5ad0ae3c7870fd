use serde::{Deserialize, Serialize};

/// Events that drive a job execution through its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum JobEvent {
    /// Begin reading chunks
    Start,
    /// Source exhausted, last chunk committed
    Complete,
    /// Read or commit failure with its cause
    Fail(String),
    /// Stop requested; in-flight commit already finished
    Stop,
}

impl JobEvent {
    /// Short name used in log fields and transition errors
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Stop => "stop",
        }
    }

    /// Failure cause carried by `Fail`
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Every event except `Start` ends the execution
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Start)
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        Self::Fail(cause.into())
    }
}
