mod common;

use chrono::Utc;
use std::sync::Arc;

use common::{active_members, launcher, settings, JOB};
use member_batch::batch::PagingStrategy;
use member_batch::models::{Activity, ExecutionCounters, JobParameters, NewJobExecution, PageCursor};
use member_batch::state_machine::BatchStatus;
use member_batch::store::{
    ChunkCommit, ChunkSink, InMemoryBatchStore, JobRepository, StoreError,
};

fn activity(id: &str) -> Activity {
    Activity {
        member_id: id.to_string(),
        name: Some(format!("Member {id}")),
        action: "Policy check".to_string(),
        status: "active".to_string(),
        created_at: Utc::now(),
    }
}

async fn started(store: &InMemoryBatchStore) -> (uuid::Uuid, uuid::Uuid) {
    let (job, step) = store
        .create_job_execution(NewJobExecution::new(JOB, "memberStep", JobParameters::new()))
        .await
        .unwrap();
    store.mark_started(job.id).await.unwrap();
    (job.id, step.id)
}

fn chunk(job: uuid::Uuid, step: uuid::Uuid, sequence: u64, ids: &[&str]) -> ChunkCommit {
    ChunkCommit {
        job_execution_id: job,
        step_execution_id: step,
        sequence,
        items: ids.iter().map(|id| activity(id)).collect(),
        contribution: ExecutionCounters {
            read_count: ids.len() as u64 + 1,
            write_count: ids.len() as u64,
            filter_count: 1,
            ..Default::default()
        },
        checkpoint: PageCursor::after(ids.last().copied().unwrap_or("")),
    }
}

#[tokio::test]
async fn test_failure_mid_flush_leaves_pre_flush_state() {
    let store = InMemoryBatchStore::new();
    let (job_id, step_id) = started(&store).await;

    store
        .commit_chunk(&chunk(job_id, step_id, 1, &["a", "b"]))
        .await
        .unwrap();
    let before_job = store.find_job_execution(job_id).await.unwrap().unwrap();
    let before_step = store.find_step_execution(job_id).await.unwrap().unwrap();
    let before_activities = store.activities();

    for after_items in [0, 1, 2, 3] {
        store.fail_commit(2, after_items);
        let err = store
            .commit_chunk(&chunk(job_id, step_id, 2, &["c", "d", "e"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Injected(_)));

        assert_eq!(store.activities(), before_activities);
        assert_eq!(
            store.find_job_execution(job_id).await.unwrap().unwrap(),
            before_job
        );
        assert_eq!(
            store.find_step_execution(job_id).await.unwrap().unwrap(),
            before_step
        );
    }

    // Same chunk goes through once the fault is gone
    store
        .commit_chunk(&chunk(job_id, step_id, 2, &["c", "d", "e"]))
        .await
        .unwrap();
    assert_eq!(store.activities().len(), 5);
}

#[tokio::test]
async fn test_replayed_chunk_is_detected_and_harmless() {
    let store = InMemoryBatchStore::new();
    let (job_id, step_id) = started(&store).await;
    let first = chunk(job_id, step_id, 1, &["a", "b", "c"]);

    store.commit_chunk(&first).await.unwrap();
    let after_once = store.activities();
    let counters_once = store.find_job_execution(job_id).await.unwrap().unwrap().counters;

    let err = store.commit_chunk(&first).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::StaleChunk {
            expected: 2,
            actual: 1,
            ..
        }
    ));

    assert_eq!(store.activities(), after_once);
    assert_eq!(
        store.find_job_execution(job_id).await.unwrap().unwrap().counters,
        counters_once
    );
}

#[tokio::test]
async fn test_upsert_replaces_existing_activity() {
    let store = InMemoryBatchStore::new();
    let (job_id, step_id) = started(&store).await;

    store
        .commit_chunk(&chunk(job_id, step_id, 1, &["a"]))
        .await
        .unwrap();

    let mut replacement = chunk(job_id, step_id, 2, &["a"]);
    replacement.items[0].action = "Re-check".to_string();
    store.commit_chunk(&replacement).await.unwrap();

    let activities = store.activities();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].action, "Re-check");
}

#[tokio::test]
async fn test_run_fails_on_commit_error_with_prior_chunks_intact() {
    let store = Arc::new(InMemoryBatchStore::with_members(active_members(25)));
    store.fail_commit(2, 4);
    let launcher = launcher(&store, settings(10, 10, PagingStrategy::Keyset));

    let execution = launcher
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap();

    assert_eq!(execution.status, BatchStatus::Failed);
    assert!(execution.exit_message.is_some());
    assert_eq!(execution.counters.commit_count, 1);
    assert_eq!(execution.counters.write_count, 10);
    assert_eq!(execution.counters.read_count, 10);
    assert_eq!(store.activities().len(), 10);

    let step = store.find_step_execution(execution.id).await.unwrap().unwrap();
    assert_eq!(step.checkpoint, PageCursor::after("m009"));
    assert_eq!(step.status, BatchStatus::Failed);
}
