//! Member to activity transformation.

use chrono::{DateTime, Utc};

use super::errors::ProcessorError;
use crate::constants::records::ACTIVE_POLICY_STATUS;
use crate::models::{Activity, Member};

/// Turns members with an active policy into activity records.
///
/// Every activity of one execution carries the same `processed_at` stamp so a
/// restarted or replayed chunk upserts identical records.
#[derive(Debug, Clone)]
pub struct MemberProcessor {
    action: String,
    processed_at: DateTime<Utc>,
}

impl MemberProcessor {
    pub fn new(action: impl Into<String>, processed_at: DateTime<Utc>) -> Self {
        Self {
            action: action.into(),
            processed_at,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }

    /// `Ok(None)` filters the member out; `Err` marks it skipped
    pub fn process(&self, member: &Member) -> Result<Option<Activity>, ProcessorError> {
        if member.id.trim().is_empty() {
            return Err(ProcessorError::MissingField {
                member_id: member.id.clone(),
                field: "id",
            });
        }

        let Some(policy_status) = member.policy_status.as_deref() else {
            return Err(ProcessorError::MissingField {
                member_id: member.id.clone(),
                field: "policy_status",
            });
        };

        if !policy_status.eq_ignore_ascii_case(ACTIVE_POLICY_STATUS) {
            return Ok(None);
        }

        Ok(Some(Activity {
            member_id: member.id.clone(),
            name: member.name.clone(),
            action: self.action.clone(),
            status: policy_status.to_string(),
            created_at: self.processed_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn processor() -> MemberProcessor {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        MemberProcessor::new("Policy check", at)
    }

    #[test]
    fn test_active_policy_emits_activity() {
        let member = Member::new("m-1")
            .with_name("Ada")
            .with_status("active")
            .with_policy_status("active");

        let activity = processor().process(&member).unwrap().unwrap();
        assert_eq!(activity.member_id, "m-1");
        assert_eq!(activity.name.as_deref(), Some("Ada"));
        assert_eq!(activity.action, "Policy check");
        assert_eq!(activity.status, "active");
        assert_eq!(activity.created_at, processor().processed_at());
    }

    #[test]
    fn test_policy_match_ignores_case() {
        let member = Member::new("m-2").with_policy_status("ACTIVE");
        let activity = processor().process(&member).unwrap().unwrap();
        assert_eq!(activity.status, "ACTIVE");
    }

    #[test]
    fn test_inactive_policy_is_filtered() {
        let member = Member::new("m-3").with_policy_status("lapsed");
        assert_eq!(processor().process(&member).unwrap(), None);
    }

    #[test]
    fn test_missing_fields_are_errors() {
        let no_policy = Member::new("m-4").with_status("active");
        assert_eq!(
            processor().process(&no_policy).unwrap_err(),
            ProcessorError::MissingField {
                member_id: "m-4".to_string(),
                field: "policy_status"
            }
        );

        let no_id = Member::new("  ").with_policy_status("active");
        assert!(matches!(
            processor().process(&no_id),
            Err(ProcessorError::MissingField { field: "id", .. })
        ));
    }

    #[test]
    fn test_missing_name_is_carried_through() {
        let member = Member::new("m-5").with_policy_status("active");
        let activity = processor().process(&member).unwrap().unwrap();
        assert_eq!(activity.name, None);
    }
}
