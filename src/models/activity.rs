//! # Activity Model
//!
//! Output record derived from one member. Activities are keyed by the source
//! member id, so writing the same chunk twice replaces rather than duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Activity {
    /// Upsert key; always the id of the member this activity was derived from
    pub member_id: String,
    pub name: Option<String>,
    pub action: String,
    /// Policy status snapshot at processing time
    pub status: String,
    pub created_at: DateTime<Utc>,
}
