//! Supervisor locks against real `workflow_tasks` rows.

use super::database::TemporaryDatabase;
use chrono::Utc;
use cueflow::{
    clock::ManualClock,
    supervisor::{
        adapters::postgres::PostgresWorkflowRepository,
        domain::{WorkflowKey, WorkflowKind, WorkflowTask, WorkflowTaskId},
        ports::{CreateOutcome, WorkflowRepository},
    },
};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

async fn stored_task(
    repository: &PostgresWorkflowRepository,
    key: &str,
) -> eyre::Result<WorkflowTaskId> {
    let clock = ManualClock::new(Utc::now());
    let task = WorkflowTask::new(
        WorkflowKind::EmailSend,
        WorkflowKey::new(key)?,
        json!({}),
        &clock,
    );
    match repository.create_if_idle(&task, 3).await? {
        CreateOutcome::Created(id) => Ok(id),
        other => eyre::bail!("expected a new task, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn held_locks_leave_the_pool_free_for_repository_calls() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let repository = PostgresWorkflowRepository::new(database.pool_of_size(2)?);
    let first = stored_task(&repository, "msg-a").await?;
    let second = stored_task(&repository, "msg-b").await?;

    let first_lock = repository.lock(first).await?;
    let second_lock = repository.lock(second).await?;
    let found = timeout(Duration::from_secs(10), repository.find_task(first)).await??;

    assert_eq!(found.map(|task| task.id()), Some(first));
    drop((first_lock, second_lock));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn a_second_holder_waits_until_the_first_releases() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let repository = PostgresWorkflowRepository::new(database.pool());
    let id = stored_task(&repository, "msg-contended").await?;

    let held = repository.lock(id).await?;
    let contender = {
        let other = repository.clone();
        tokio::spawn(async move { other.lock(id).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!contender.is_finished(), "lock acquired while still held");

    drop(held);
    let acquired = timeout(Duration::from_secs(10), contender).await???;
    drop(acquired);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn released_locks_can_be_taken_again_at_once() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let repository = PostgresWorkflowRepository::new(database.pool());
    let id = stored_task(&repository, "msg-again").await?;

    for _ in 0..5 {
        let guard = timeout(Duration::from_secs(10), repository.lock(id)).await??;
        drop(guard);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn locking_an_unknown_task_returns_immediately() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let repository = PostgresWorkflowRepository::new(database.pool());

    let guard = timeout(Duration::from_secs(1), repository.lock(WorkflowTaskId::new())).await??;
    drop(guard);
    Ok(())
}
