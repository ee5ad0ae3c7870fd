mod common;

use chrono::Utc;
use std::sync::Arc;

use common::{active_members, launcher, settings, JOB};
use member_batch::batch::PagingStrategy;
use member_batch::constants::messages::INTERRUPTED_BY_RESTART;
use member_batch::models::{JobParameters, NewJobExecution, PageCursor};
use member_batch::state_machine::BatchStatus;
use member_batch::store::{InMemoryBatchStore, JobRepository};

#[tokio::test]
async fn test_failed_run_resumes_from_checkpoint() {
    let store = Arc::new(InMemoryBatchStore::with_members(active_members(20)));
    store.fail_commit(2, 0);
    let launcher = launcher(&store, settings(10, 10, PagingStrategy::Keyset));

    let failed = launcher
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap();
    assert_eq!(failed.status, BatchStatus::Failed);
    assert_eq!(failed.counters.write_count, 10);

    assert_eq!(
        launcher.resume_point(JOB).await.unwrap(),
        Some(PageCursor::after("m009"))
    );

    let resumed = launcher
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap();

    assert_eq!(resumed.status, BatchStatus::Completed);
    assert_eq!(resumed.restarted_from, Some(failed.id));
    // Counters describe this execution only
    assert_eq!(resumed.counters.read_count, 10);
    assert_eq!(resumed.counters.write_count, 10);
    assert_eq!(resumed.counters.commit_count, 1);

    let activities = store.activities();
    assert_eq!(activities.len(), 20);
    let second_run: Vec<_> = store
        .commit_log()
        .into_iter()
        .filter(|c| c.job_execution_id == resumed.id)
        .collect();
    assert_eq!(second_run.len(), 1);
    assert_eq!(second_run[0].checkpoint, PageCursor::after("m019"));

    // A completed run leaves nothing to resume
    assert_eq!(launcher.resume_point(JOB).await.unwrap(), None);
}

#[tokio::test]
async fn test_restart_disabled_starts_fresh() {
    let store = Arc::new(InMemoryBatchStore::with_members(active_members(20)));
    store.fail_commit(2, 0);
    let mut fresh_settings = settings(10, 10, PagingStrategy::Keyset);
    fresh_settings.restart_from_checkpoint = false;
    let launcher = launcher(&store, fresh_settings);

    let failed = launcher
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap();
    assert_eq!(failed.status, BatchStatus::Failed);
    assert_eq!(launcher.resume_point(JOB).await.unwrap(), None);

    let rerun = launcher
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap();

    assert_eq!(rerun.status, BatchStatus::Completed);
    assert_eq!(rerun.restarted_from, None);
    assert_eq!(rerun.counters.read_count, 20);
    assert_eq!(rerun.counters.write_count, 20);
    assert_eq!(store.activities().len(), 20);
}

#[tokio::test]
async fn test_checkpoint_from_other_paging_strategy_is_ignored() {
    let store = Arc::new(InMemoryBatchStore::with_members(active_members(20)));
    store.fail_commit(2, 0);

    let offset = launcher(&store, settings(10, 10, PagingStrategy::Offset));
    let failed = offset
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap();
    assert_eq!(failed.status, BatchStatus::Failed);
    assert_eq!(
        offset.resume_point(JOB).await.unwrap(),
        Some(PageCursor::Offset { skip: 10 })
    );

    let keyset = launcher(&store, settings(10, 10, PagingStrategy::Keyset));
    assert_eq!(keyset.resume_point(JOB).await.unwrap(), None);

    let rerun = keyset
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap();
    assert_eq!(rerun.status, BatchStatus::Completed);
    assert_eq!(rerun.restarted_from, None);
    assert_eq!(rerun.counters.read_count, 20);
}

#[tokio::test]
async fn test_offset_checkpoint_resumes_exactly() {
    let store = Arc::new(InMemoryBatchStore::with_members(active_members(23)));
    store.fail_commit(3, 0);
    let launcher = launcher(&store, settings(5, 4, PagingStrategy::Offset));

    let failed = launcher
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap();
    assert_eq!(failed.status, BatchStatus::Failed);
    assert_eq!(failed.counters.write_count, 10);

    let resumed = launcher
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap();
    assert_eq!(resumed.status, BatchStatus::Completed);
    assert_eq!(resumed.counters.read_count, 13);
    assert_eq!(store.activities().len(), 23);
}

#[tokio::test]
async fn test_recover_interrupted_unblocks_launch() {
    let store = Arc::new(InMemoryBatchStore::with_members(active_members(3)));
    let (orphan, _) = store
        .create_job_execution(NewJobExecution::new(JOB, "memberStep", JobParameters::new()))
        .await
        .unwrap();
    store.mark_started(orphan.id).await.unwrap();

    let launcher = launcher(&store, settings(10, 10, PagingStrategy::Keyset));
    assert!(launcher
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap_err()
        .is_launch_conflict());

    let recovered = launcher.recover_interrupted(JOB).await.unwrap();
    assert_eq!(recovered, vec![orphan.id]);

    let record = store.find_job_execution(orphan.id).await.unwrap().unwrap();
    assert_eq!(record.status, BatchStatus::Failed);
    assert_eq!(record.exit_message.as_deref(), Some(INTERRUPTED_BY_RESTART));

    // Nothing was committed, so there is no checkpoint to resume from
    assert_eq!(launcher.resume_point(JOB).await.unwrap(), None);

    let execution = launcher
        .launch(JOB, JobParameters::manual(Utc::now()))
        .await
        .unwrap();
    assert_eq!(execution.status, BatchStatus::Completed);
    assert_eq!(execution.restarted_from, None);
    assert!(launcher.recover_interrupted(JOB).await.unwrap().is_empty());
}
