//! # Member Model
//!
//! Input record of the member activity job. Members are owned by the external
//! store; the engine only ever holds the copies of the page it is processing.
//!
//! ## Database Schema
//!
//! Maps to the configured input collection (default `members`):
//! ```sql
//! CREATE TABLE members (
//!   id TEXT PRIMARY KEY,
//!   name TEXT,
//!   status TEXT,
//!   policy_status TEXT
//! );
//! ```

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A member as read from the input collection.
///
/// `status` is the primary status the reader filters on; `policy_status` is
/// the secondary status the processor inspects. Either may be absent in the
/// stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub policy_status: Option<String>,
}

impl Member {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            status: None,
            policy_status: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_policy_status(mut self, policy_status: impl Into<String>) -> Self {
        self.policy_status = Some(policy_status.into());
        self
    }

    /// Whether the primary status matches the reader's qualifying predicate
    pub fn has_status(&self, status: &str) -> bool {
        self.status.as_deref() == Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let member = Member::new("m-001")
            .with_name("Ada")
            .with_status("active")
            .with_policy_status("inactive");

        assert_eq!(member.id, "m-001");
        assert_eq!(member.name.as_deref(), Some("Ada"));
        assert!(member.has_status("active"));
        assert!(!member.has_status("Active"));
        assert_eq!(member.policy_status.as_deref(), Some("inactive"));
    }

    #[test]
    fn test_missing_fields_deserialize_as_none() {
        let member: Member = serde_json::from_str(r#"{"id": "m-002", "name": null, "status": "active", "policy_status": null}"#).unwrap();
        assert!(member.policy_status.is_none());
        assert!(member.name.is_none());
    }
}
