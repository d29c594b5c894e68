//! In-memory integration tests for claiming work across workers.

use super::helpers::{Harness, harness};
use cueflow::{
    queue::domain::TaskKind,
    supervisor::domain::KeyStatus,
    worker::{WorkReport, Worker},
    workflows::domain::{Channel, MessageId, NotificationRequest},
};
use rstest::rstest;
use serde_json::{Value, json};
use std::collections::HashSet;

fn digest(recipient: &str) -> NotificationRequest {
    NotificationRequest::email(
        MessageId::new(),
        recipient,
        "Your weekly digest",
        "You reviewed {{ cards }} cards this week.",
        json!({ "cards": 140 }),
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn work_claimed_by_a_crashed_worker_is_retried_after_the_lease(
    harness: Harness,
) -> eyre::Result<()> {
    harness.gateway.always(TaskKind::Email, Ok(json!({})));
    let request = digest("crash@example.com");
    harness.engine.kickoff_email(&request, harness.now()).await?;

    let abandoned = harness
        .engine
        .queue()
        .dequeue_next_available_task()
        .await?
        .ok_or_else(|| eyre::eyre!("supervisor task should be due"))?;
    assert_eq!(harness.worker.run_once().await?, WorkReport::Idle);

    harness.clock.advance_secs(299);
    assert_eq!(harness.worker.run_once().await?, WorkReport::Idle);
    harness.clock.advance_secs(2);
    let report = harness.worker.run_once().await?;

    assert_eq!(
        report,
        WorkReport::Completed {
            task_id: abandoned.0.id(),
            kind: TaskKind::DbFunction,
        }
    );
    harness.drain().await?;
    assert_eq!(harness.gateway.calls(TaskKind::Email).len(), 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_workers_send_each_message_once(harness: Harness) -> eyre::Result<()> {
    harness.gateway.always(TaskKind::Email, Ok(json!({})));
    let recipients: Vec<String> = (0..12)
        .map(|n| format!("learner{n}@example.com"))
        .collect();
    let mut requests = Vec::new();
    for recipient in &recipients {
        let request = digest(recipient);
        harness.engine.kickoff_email(&request, harness.now()).await?;
        requests.push(request);
    }

    let workers: Vec<Worker> = (0..4).map(|_| harness.worker.clone()).collect();
    let handles: Vec<_> = workers
        .into_iter()
        .map(|worker| tokio::spawn(async move { worker.run_until_idle(100).await }))
        .collect();
    for handle in handles {
        handle.await??;
    }
    harness.rounds(2, 10).await?;

    let sent: Vec<Value> = harness.gateway.calls(TaskKind::Email);
    let unique: HashSet<String> = sent
        .iter()
        .filter_map(|input| input.get("to").and_then(Value::as_str).map(str::to_owned))
        .collect();
    assert_eq!(sent.len(), recipients.len());
    assert_eq!(unique.len(), recipients.len());
    for request in &requests {
        let status = harness
            .engine
            .delivery_status(Channel::Email, request.message_id)
            .await?;
        eyre::ensure!(
            matches!(status, KeyStatus::Succeeded(_)),
            "message {} not delivered: {status:?}",
            request.message_id
        );
    }
    Ok(())
}
