//! # Job Parameters
//!
//! Launch parameters attached to every job execution. Each trigger adds a
//! distinguishing timestamp so repeated launches with identical business
//! parameters still have distinct parameter identities. The overlap guard is
//! keyed on the job name and ignores parameters entirely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::parameters::{MANUAL_RUN_TIME, SCHEDULED_TIME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum JobParameter {
    String(String),
    Long(i64),
    DateTime(DateTime<Utc>),
}

impl fmt::Display for JobParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => write!(f, "{value}"),
            Self::Long(value) => write!(f, "{value}"),
            Self::DateTime(value) => write!(f, "{}", value.to_rfc3339()),
        }
    }
}

/// Ordered parameter map; ordering makes the identity string canonical.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobParameters(BTreeMap<String, JobParameter>);

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters for a launch fired by the fixed-rate scheduler
    pub fn scheduled(at: DateTime<Utc>) -> Self {
        Self::new().with_long(SCHEDULED_TIME, at.timestamp_millis())
    }

    /// Parameters for a launch requested through the manual trigger
    pub fn manual(at: DateTime<Utc>) -> Self {
        Self::new().with_long(MANUAL_RUN_TIME, at.timestamp_millis())
    }

    pub fn with_long(mut self, name: impl Into<String>, value: i64) -> Self {
        self.0.insert(name.into(), JobParameter::Long(value));
        self
    }

    pub fn with_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), JobParameter::String(value.into()));
        self
    }

    pub fn with_date_time(mut self, name: impl Into<String>, value: DateTime<Utc>) -> Self {
        self.0.insert(name.into(), JobParameter::DateTime(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&JobParameter> {
        self.0.get(name)
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(JobParameter::Long(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JobParameter)> {
        self.0.iter()
    }

    /// Canonical `name=value` list used to tell launches apart in logs and history
    pub fn identity(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}
