//! # Page Cursor
//!
//! Position of the reader inside the qualifying member collection. The cursor
//! is the only state carried between page fetches and is persisted on the
//! step execution as the restart checkpoint after every committed chunk.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageCursor {
    /// Nothing consumed yet
    #[default]
    Start,
    /// Offset paging: number of qualifying members already consumed.
    /// During plain paging this is `page_index * page_size`; a checkpoint
    /// taken mid-page stores the exact item count.
    Offset { skip: u64 },
    /// Keyset paging: id of the last consumed member
    After { last_id: String },
}

impl PageCursor {
    pub fn after(last_id: impl Into<String>) -> Self {
        Self::After {
            last_id: last_id.into(),
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    /// Items to skip for offset paging; zero for the other variants
    pub fn skip(&self) -> u64 {
        match self {
            Self::Offset { skip } => *skip,
            _ => 0,
        }
    }

    /// Exclusive lower bound for keyset paging
    pub fn last_id(&self) -> Option<&str> {
        match self {
            Self::After { last_id } => Some(last_id),
            _ => None,
        }
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Offset { skip } => write!(f, "offset:{skip}"),
            Self::After { last_id } => write!(f, "after:{last_id}"),
        }
    }
}
