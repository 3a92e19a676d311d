//! Black-box pending-selector scenarios against a repository, complementing
//! the pure `select_from` unit tests in `src/selector.rs`: these exercise
//! `select_pending`'s own date-cutoff query plus interaction with emails of
//! mixed status.

use chrono::NaiveDate;
use outreach_engine::domain::Email;
use outreach_engine::domain::EmailAddress;
use outreach_engine::domain::EmailEntry;
use outreach_engine::domain::EmailMetadata;
use outreach_engine::domain::EmailStatus;
use outreach_engine::domain::TemplateType;
use outreach_engine::repository::fake::FakeEmailRepository;
use outreach_engine::repository::EmailRepository;
use outreach_engine::selector::select_pending;
use uuid::Uuid;

fn entry(
    recipient_id: Uuid,
    followup_number: u32,
    status: EmailStatus,
    scheduled: NaiveDate,
) -> EmailEntry {
    let entity = Email {
        id: Uuid::new_v4(),
        sender: EmailAddress::parse("s@x.com".to_string()).unwrap(),
        recipient: EmailAddress::parse("r@x.com".to_string()).unwrap(),
        subject: "s".to_string(),
        body: "b".to_string(),
        email_type: if followup_number == 0 { TemplateType::Initial } else { TemplateType::FollowUp },
    };
    let sent_date = (status == EmailStatus::Sent).then_some(scheduled);
    let failure_reason = (status == EmailStatus::Failed).then(|| "x".to_string());
    let metadata =
        EmailMetadata::new(Some(Uuid::new_v4()), recipient_id, followup_number, status, failure_reason, scheduled, sent_date)
            .unwrap();
    EmailEntry::new(entity, metadata)
}

#[tokio::test]
async fn only_pending_emails_scheduled_before_the_cutoff_are_selected() {
    let repo = FakeEmailRepository::default();
    let recipient_id = Uuid::new_v4();
    let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();

    let due = entry(recipient_id, 0, EmailStatus::Pending, today);
    let future = entry(Uuid::new_v4(), 0, EmailStatus::Pending, today.succ_opt().unwrap().succ_opt().unwrap());
    let already_sent = entry(Uuid::new_v4(), 0, EmailStatus::Sent, today);

    repo.save(due.clone()).await.unwrap();
    repo.save(future).await.unwrap();
    repo.save(already_sent).await.unwrap();

    let selected = select_pending(&repo, today).await.unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].entity.id, due.entity.id);
}

#[tokio::test]
async fn selector_picks_lowest_pending_followup_per_recipient_from_repository() {
    let repo = FakeEmailRepository::default();
    let recipient_id = Uuid::new_v4();
    let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();

    repo.save(entry(recipient_id, 0, EmailStatus::Sent, today)).await.unwrap();
    repo.save(entry(recipient_id, 1, EmailStatus::Pending, today)).await.unwrap();
    repo.save(entry(recipient_id, 2, EmailStatus::Pending, today)).await.unwrap();

    let selected = select_pending(&repo, today).await.unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].metadata.followup_number, 1);
}
