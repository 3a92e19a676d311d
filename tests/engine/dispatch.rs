//! Black-box dispatch scenarios composed over the fake repositories and
//! fake mail gateway: §8's S3/S4 scenarios plus invariant 9 (dispatching
//! twice never re-sends an already-SENT email) and invariant 6 (reply-gate
//! monotonicity holds across repeated selector/dispatch passes).

use chrono::NaiveDate;
use outreach_engine::dispatch::dispatch_all;
use outreach_engine::dispatch::DispatchOutcome;
use outreach_engine::domain::Email;
use outreach_engine::domain::EmailEntry;
use outreach_engine::domain::EmailMetadata;
use outreach_engine::domain::EmailStatus;
use outreach_engine::domain::TemplateType;
use outreach_engine::domain::ThreadId;
use outreach_engine::gateway::fake::FakeMailGateway;
use outreach_engine::repository::fake::FakeEmailRepository;
use outreach_engine::repository::fake::FakeRecipientRepository;
use outreach_engine::repository::EmailRepository;
use outreach_engine::repository::RecipientRepository;
use outreach_engine::selector::select_pending;
use uuid::Uuid;

use crate::support;

fn pending_email(
    recipient_id: Uuid,
    followup_number: u32,
    email_type: TemplateType,
    scheduled: NaiveDate,
) -> EmailEntry {
    let entity = Email {
        id: Uuid::new_v4(),
        sender: support::sender(),
        recipient: outreach_engine::domain::EmailAddress::parse("r@x.com".to_string()).unwrap(),
        subject: "s".to_string(),
        body: "b".to_string(),
        email_type,
    };
    let metadata =
        EmailMetadata::new(Some(Uuid::new_v4()), recipient_id, followup_number, EmailStatus::Pending, None, scheduled, None)
            .unwrap();
    EmailEntry::new(entity, metadata)
}

#[tokio::test]
async fn s4_initial_send_binds_thread_id_via_full_pipeline() {
    support::init_tracing();
    let recipient = support::recipient("s4@b.com");
    let recipient_repo = FakeRecipientRepository::default();
    recipient_repo.save(recipient.clone(), support::recipient_metadata(Uuid::new_v4())).await.unwrap();

    let email_repo = FakeEmailRepository::default();
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let pending = pending_email(recipient.id, 0, TemplateType::Initial, today);
    email_repo.save(pending.clone()).await.unwrap();

    let mail_gateway = FakeMailGateway::default();
    *mail_gateway.next_thread_id.lock().unwrap() = Some(ThreadId::new("T123".to_string()));

    let selected = select_pending(&email_repo, today).await.unwrap();
    assert_eq!(selected.len(), 1);

    let results = dispatch_all(&selected, false, today, &mail_gateway, &email_repo, &recipient_repo).await;
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0].outcome, DispatchOutcome::Sent { .. }));

    let (_, updated_metadata) = recipient_repo.find_by_id(recipient.id).await.unwrap().unwrap();
    assert_eq!(updated_metadata.thread_id, Some(ThreadId::new("T123".to_string())));
}

#[tokio::test]
async fn invariant_9_dispatching_twice_never_resends_a_sent_email() {
    support::init_tracing();
    let recipient = support::recipient("twice@b.com");
    let recipient_repo = FakeRecipientRepository::default();
    recipient_repo.save(recipient.clone(), support::recipient_metadata(Uuid::new_v4())).await.unwrap();

    let email_repo = FakeEmailRepository::default();
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let pending = pending_email(recipient.id, 0, TemplateType::Initial, today);
    email_repo.save(pending.clone()).await.unwrap();

    let mail_gateway = FakeMailGateway::default();

    let first_selection = select_pending(&email_repo, today).await.unwrap();
    dispatch_all(&first_selection, false, today, &mail_gateway, &email_repo, &recipient_repo).await;
    assert_eq!(mail_gateway.sent.lock().unwrap().len(), 1);

    let second_selection = select_pending(&email_repo, today).await.unwrap();
    assert!(second_selection.is_empty());
    dispatch_all(&second_selection, false, today, &mail_gateway, &email_repo, &recipient_repo).await;
    assert_eq!(mail_gateway.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn invariant_6_reply_gate_monotonicity_survives_repeated_selector_passes() {
    support::init_tracing();
    let recipient = support::recipient("replied@b.com");
    let recipient_repo = FakeRecipientRepository::default();
    let thread_id = ThreadId::new("t-replied".to_string());
    let mut recipient_metadata = support::recipient_metadata(Uuid::new_v4());
    recipient_metadata.thread_id = Some(thread_id.clone());
    recipient_repo.save(recipient.clone(), recipient_metadata).await.unwrap();

    let email_repo = FakeEmailRepository::default();
    let today = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
    let followup = pending_email(recipient.id, 1, TemplateType::FollowUp, today);
    email_repo.save(followup.clone()).await.unwrap();

    let mail_gateway = FakeMailGateway::default();
    mail_gateway.reply_threads.lock().unwrap().push(thread_id);

    for _ in 0..2 {
        let selected = select_pending(&email_repo, today).await.unwrap();
        assert_eq!(selected.len(), 1, "selector still offers the un-cancelled follow-up each pass");
        let results = dispatch_all(&selected, false, today, &mail_gateway, &email_repo, &recipient_repo).await;
        assert!(matches!(results[0].outcome, DispatchOutcome::SkippedAlreadyReplied));
    }

    // never transitioned PENDING -> SENT across either pass
    let stored = email_repo.find_by_id(followup.entity.id).await.unwrap().unwrap();
    assert_eq!(stored.metadata.status, EmailStatus::Pending);
    assert!(mail_gateway.sent.lock().unwrap().is_empty());
}
