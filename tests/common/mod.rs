//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use member_batch::batch::PagingStrategy;
use member_batch::config::BatchSettings;
use member_batch::launcher::JobLauncher;
use member_batch::models::Member;
use member_batch::store::{InMemoryBatchStore, MemberQuery, MemberSource, StoreResult};

pub const JOB: &str = "memberActivityJob";

/// Qualifying member with the given policy status
pub fn member(id: &str, policy_status: &str) -> Member {
    Member::new(id)
        .with_name(format!("Member {id}"))
        .with_status("active")
        .with_policy_status(policy_status)
}

/// `count` qualifying members `m000..`, every one with an active policy
pub fn active_members(count: usize) -> Vec<Member> {
    (0..count)
        .map(|i| member(&format!("m{i:03}"), "active"))
        .collect()
}

/// 25 qualifying members (15 with an active policy, 10 inactive) plus five
/// members whose primary status keeps them out of the read entirely
pub fn scenario_members() -> Vec<Member> {
    let mut members: Vec<Member> = (0..25)
        .map(|i| {
            let policy = if i % 5 < 3 { "active" } else { "inactive" };
            member(&format!("m{i:03}"), policy)
        })
        .collect();

    members.extend((0..5).map(|i| {
        Member::new(format!("x{i:03}"))
            .with_status("inactive")
            .with_policy_status("active")
    }));
    members
}

pub fn settings(chunk_size: usize, page_size: usize, paging: PagingStrategy) -> BatchSettings {
    BatchSettings {
        chunk_size,
        page_size,
        paging,
        ..BatchSettings::default()
    }
}

pub fn launcher(store: &Arc<InMemoryBatchStore>, settings: BatchSettings) -> Arc<JobLauncher> {
    Arc::new(JobLauncher::new(
        store.clone(),
        store.clone(),
        store.clone(),
        settings,
    ))
}

/// Member source that pauses on one fetch until the test releases it
pub struct GatedSource {
    inner: Arc<InMemoryBatchStore>,
    gate_at: usize,
    fetches: AtomicUsize,
    pub reached: Notify,
    pub release: Notify,
}

impl GatedSource {
    /// Pause the fetch with zero-based index `gate_at`
    pub fn new(inner: Arc<InMemoryBatchStore>, gate_at: usize) -> Self {
        Self {
            inner,
            gate_at,
            fetches: AtomicUsize::new(0),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl MemberSource for GatedSource {
    async fn fetch_members(&self, query: &MemberQuery) -> StoreResult<Vec<Member>> {
        if self.fetches.fetch_add(1, Ordering::SeqCst) == self.gate_at {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.fetch_members(query).await
    }
}
