//! Queue behaviour against real `PostgreSQL` rows.

use super::database::TemporaryDatabase;
use chrono::{Duration, TimeZone, Utc};
use cueflow::{
    clock::ManualClock,
    queue::{
        adapters::postgres::PostgresTaskStore,
        domain::{QueueTaskId, TaskKind},
        services::{QueueError, QueueService},
    },
};
use mockable::Clock;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

type PgQueue = QueueService<PostgresTaskStore, ManualClock>;

fn queue(database: &TemporaryDatabase) -> eyre::Result<(PgQueue, ManualClock)> {
    let start = Utc
        .with_ymd_and_hms(2026, 4, 1, 8, 0, 0)
        .single()
        .ok_or_else(|| eyre::eyre!("ambiguous start time"))?;
    let clock = ManualClock::new(start);
    let service = QueueService::new(
        Arc::new(PostgresTaskStore::new(database.pool())),
        Arc::new(clock.clone()),
    );
    Ok((service, clock))
}

#[tokio::test(flavor = "multi_thread")]
async fn claims_follow_schedule_order_and_leases() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let (service, clock) = queue(&database)?;
    let now = clock.utc();
    let later = service
        .enqueue(TaskKind::Email, json!({ "to": "b@example.com" }), now)
        .await?;
    let earlier = service
        .enqueue(
            TaskKind::Sms,
            json!({ "to": "+4915100000000" }),
            now - Duration::seconds(5),
        )
        .await?;
    service
        .enqueue(
            TaskKind::Email,
            json!({ "to": "future@example.com" }),
            now + Duration::hours(1),
        )
        .await?;

    let first = service.dequeue_next_available_task().await?;
    let second = service.dequeue_next_available_task().await?;
    let third = service.dequeue_next_available_task().await?;

    assert_eq!(first.map(|(task, _)| task.id()), Some(earlier.id()));
    assert_eq!(second.map(|(task, _)| task.id()), Some(later.id()));
    assert!(third.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_leases_release_the_task() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let (service, clock) = queue(&database)?;
    let task = service
        .enqueue(TaskKind::DbFunction, json!({ "function": "noop" }), clock.utc())
        .await?;
    let (_, lease) = service
        .dequeue_next_available_task()
        .await?
        .ok_or_else(|| eyre::eyre!("task should be claimable"))?;

    clock.advance_secs(299);
    let during = service.dequeue_next_available_task().await?;
    clock.advance_secs(1);
    let after = service.dequeue_next_available_task().await?;

    assert_eq!(lease.expires_at, task.scheduled_at() + Duration::seconds(300));
    assert!(during.is_none());
    let (reclaimed, second_lease) =
        after.ok_or_else(|| eyre::eyre!("task should be reclaimed"))?;
    assert_eq!(reclaimed.id(), task.id());
    assert_ne!(second_lease.id, lease.id);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_is_recorded_once_and_hides_the_task() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let (service, clock) = queue(&database)?;
    let task = service
        .enqueue(TaskKind::Email, json!({ "to": "done@example.com" }), clock.utc())
        .await?;

    let first = service.complete_task(task.id()).await?;
    let second = service.complete_task(task.id()).await?;
    clock.advance_secs(3600);

    assert!(first);
    assert!(!second);
    assert!(service.dequeue_next_available_task().await?.is_none());
    let stored = service
        .find_task(task.id())
        .await?
        .ok_or_else(|| eyre::eyre!("task should persist"))?;
    assert_eq!(stored.payload(), &json!({ "to": "done@example.com" }));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn completing_an_unknown_task_is_an_error() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let (service, _) = queue(&database)?;

    let result = service.complete_task(QueueTaskId::new()).await;

    eyre::ensure!(
        matches!(result, Err(QueueError::Store(_))),
        "expected a store error, got {result:?}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn failures_are_logged_without_requeueing() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let (service, clock) = queue(&database)?;
    let task = service
        .enqueue(TaskKind::Sms, json!({ "to": "+4915100000001" }), clock.utc())
        .await?;
    service.dequeue_next_available_task().await?;

    let record = service
        .fail_task(Some(task.id()), "carrier rejected the number")
        .await?;
    let orphan = service.fail_task(None, "worker lost its connection").await?;

    assert_eq!(record.task_id, Some(task.id()));
    assert_eq!(orphan.task_id, None);
    assert!(service.dequeue_next_available_task().await?.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_claimants_never_share_a_live_lease() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let (service, clock) = queue(&database)?;
    let due = clock.utc();
    let mut enqueued = HashSet::new();
    for n in 0..300 {
        let task = service
            .enqueue(TaskKind::Email, json!({ "to": format!("c{n}@example.com") }), due)
            .await?;
        enqueued.insert(task.id());
    }

    let claimants: Vec<_> = (0..16)
        .map(|_| {
            let claimant = service.clone();
            tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some((task, _)) = claimant.dequeue_next_available_task().await? {
                    claimed.push(task.id());
                }
                Ok::<_, QueueError>(claimed)
            })
        })
        .collect();
    let mut claims = Vec::new();
    for claimant in claimants {
        claims.extend(claimant.await??);
    }

    let distinct: HashSet<QueueTaskId> = claims.iter().copied().collect();
    assert_eq!(claims.len(), enqueued.len(), "a task was claimed twice");
    assert_eq!(distinct, enqueued);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn tasks_completed_after_lease_expiry_are_not_reclaimed() -> eyre::Result<()> {
    let Some(database) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let (service, clock) = queue(&database)?;
    let task = service
        .enqueue(TaskKind::Email, json!({ "to": "late@example.com" }), clock.utc())
        .await?;
    service.dequeue_next_available_task().await?;
    clock.advance_secs(600);

    service.complete_task(task.id()).await?;

    assert!(service.dequeue_next_available_task().await?.is_none());
    Ok(())
}
