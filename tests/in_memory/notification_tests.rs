//! In-memory integration tests for email and SMS delivery.

use super::helpers::{Harness, harness};
use cueflow::{
    queue::domain::TaskKind,
    supervisor::{domain::KeyStatus, services::KickoffOutcome},
    workflows::domain::{Channel, MessageId, NotificationRequest},
};
use rstest::rstest;
use serde_json::json;

fn reminder(message_id: MessageId) -> NotificationRequest {
    NotificationRequest::email(
        message_id,
        "learner@example.com",
        "{{ due }} cards are due",
        "Hi {{ name }}, {{ due }} cards are waiting in {{ deck }}.",
        json!({ "name": "Mika", "due": 12, "deck": "Kanji N5" }),
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn email_is_rendered_sent_and_recorded(harness: Harness) -> eyre::Result<()> {
    harness
        .gateway
        .always(TaskKind::Email, Ok(json!({ "message_id": "ses-1" })));
    let request = reminder(MessageId::new());

    harness.engine.kickoff_email(&request, harness.now()).await?;
    harness.rounds(2, 10).await?;

    assert_eq!(
        harness.gateway.calls(TaskKind::Email),
        vec![json!({
            "to": "learner@example.com",
            "subject": "12 cards are due",
            "body": "Hi Mika, 12 cards are waiting in Kanji N5."
        })]
    );
    let status = harness
        .engine
        .delivery_status(Channel::Email, request.message_id)
        .await?;
    eyre::ensure!(
        matches!(status, KeyStatus::Succeeded(_)),
        "expected delivered email, got {status:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn kickoff_is_idempotent_while_a_delivery_is_in_progress(
    harness: Harness,
) -> eyre::Result<()> {
    let request = reminder(MessageId::new());

    let first = harness.engine.kickoff_email(&request, harness.now()).await?;
    let second = harness.engine.kickoff_email(&request, harness.now()).await?;

    let KickoffOutcome::Started { workflow_task_id } = first else {
        eyre::bail!("expected a started task, got {first:?}");
    };
    assert_eq!(
        second,
        KickoffOutcome::AlreadyInProgress { workflow_task_id }
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_delivered_message_can_be_sent_again(harness: Harness) -> eyre::Result<()> {
    harness.gateway.always(TaskKind::Email, Ok(json!({})));
    let request = reminder(MessageId::new());
    harness.engine.kickoff_email(&request, harness.now()).await?;
    harness.rounds(2, 10).await?;

    let again = harness.engine.kickoff_email(&request, harness.now()).await?;
    harness.rounds(2, 10).await?;

    eyre::ensure!(
        matches!(again, KickoffOutcome::Started { .. }),
        "expected a new task after success, got {again:?}"
    );
    assert_eq!(harness.gateway.calls(TaskKind::Email).len(), 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_sends_back_off_exponentially(harness: Harness) -> eyre::Result<()> {
    harness
        .gateway
        .always(TaskKind::Email, Err("mailbox unavailable".to_owned()));
    let request = reminder(MessageId::new());
    harness.engine.kickoff_email(&request, harness.now()).await?;

    // Attempts start at 0s, 10s, 30s and 70s: each wait doubles.
    let expected_sends = [(0, 1), (9, 1), (10, 2), (29, 2), (30, 3), (69, 3), (70, 4)];
    for (secs, sends) in expected_sends {
        harness.at(secs);
        harness.drain().await?;
        assert_eq!(
            harness.gateway.calls(TaskKind::Email).len(),
            sends,
            "sends after {secs}s"
        );
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn undeliverable_sms_is_given_up_after_five_attempts(harness: Harness) -> eyre::Result<()> {
    harness
        .gateway
        .always(TaskKind::Sms, Err("number unreachable".to_owned()));
    let request = NotificationRequest::sms(
        MessageId::new(),
        "+4915112345678",
        "Your streak ends tonight, {{ name }}!",
        json!({ "name": "Mika" }),
    );

    harness.engine.kickoff_sms(&request, harness.now()).await?;
    harness.rounds(10, 200).await?;

    assert_eq!(harness.gateway.calls(TaskKind::Sms).len(), 5);
    let status = harness
        .engine
        .delivery_status(Channel::Sms, request.message_id)
        .await?;
    eyre::ensure!(status.is_stuck(), "expected exhausted sms, got {status:?}");
    let retry = harness.engine.kickoff_sms(&request, harness.now()).await?;
    eyre::ensure!(
        matches!(retry, KickoffOutcome::Started { .. }),
        "an exhausted message may be retried, got {retry:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_recovering_provider_lets_delivery_finish(harness: Harness) -> eyre::Result<()> {
    harness
        .gateway
        .then(TaskKind::Email, Err("throttled".to_owned()));
    harness
        .gateway
        .then(TaskKind::Email, Err("throttled".to_owned()));
    harness.gateway.always(TaskKind::Email, Ok(json!({})));
    let request = reminder(MessageId::new());

    harness.engine.kickoff_email(&request, harness.now()).await?;
    harness.rounds(6, 60).await?;

    assert_eq!(harness.gateway.calls(TaskKind::Email).len(), 3);
    let status = harness
        .engine
        .delivery_status(Channel::Email, request.message_id)
        .await?;
    eyre::ensure!(
        matches!(status, KeyStatus::Succeeded(_)),
        "expected delivery after recovery, got {status:?}"
    );
    Ok(())
}
