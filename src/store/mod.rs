//! # Document Store Boundary
//!
//! The engine talks to storage through three narrow traits:
//!
//! - [`MemberSource`] - filtered, id-ordered, paged read over the input collection
//! - [`ChunkSink`] - one atomic commit per chunk: activity upserts, counter
//!   deltas, checkpoint and chunk sequence marker together
//! - [`JobRepository`] - job/step execution records and the overlap guard
//!
//! Two backends implement all three: [`memory::InMemoryBatchStore`] and
//! [`postgres::PgBatchStore`]. Anything implementing the three traits is a
//! [`BatchStore`].

pub mod errors;
pub mod memory;
pub mod postgres;
pub mod repository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Activity, ExecutionCounters, Member, PageCursor};

pub use errors::{StoreError, StoreResult};
pub use memory::{FaultPlan, InMemoryBatchStore};
pub use postgres::PgBatchStore;
pub use repository::JobRepository;

/// Read query issued once per page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberQuery {
    /// Primary status a member must carry
    pub status: String,
    /// `Start` and `After` resume by key, `Offset` skips
    pub cursor: PageCursor,
    pub limit: usize,
}

#[async_trait]
pub trait MemberSource: Send + Sync {
    /// Members with `status == query.status`, ordered by id ascending,
    /// positioned by the cursor and capped at `query.limit`
    async fn fetch_members(&self, query: &MemberQuery) -> StoreResult<Vec<Member>>;
}

/// Everything written by one chunk commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCommit {
    pub job_execution_id: Uuid,
    pub step_execution_id: Uuid,
    /// Expected `commit_count` after this commit; must be exactly one past
    /// the stored value or the commit is rejected as stale
    pub sequence: u64,
    pub items: Vec<Activity>,
    /// Counter deltas; `write_count` equals `items.len()`
    pub contribution: ExecutionCounters,
    /// Reader position covering every item of this chunk
    pub checkpoint: PageCursor,
}

#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Apply the chunk atomically: either every upsert and counter update
    /// lands or none of them do
    async fn commit_chunk(&self, commit: &ChunkCommit) -> StoreResult<()>;
}

/// A backend providing every storage capability the engine needs
pub trait BatchStore: MemberSource + ChunkSink + JobRepository {}

impl<T> BatchStore for T where T: MemberSource + ChunkSink + JobRepository {}
