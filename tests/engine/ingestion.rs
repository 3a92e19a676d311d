//! Black-box ingestion scenario from §8 (S5) plus invariant 10: ingesting
//! the same spreadsheet rows twice produces no duplicate external emails.

use outreach_engine::domain::EmailStatus;
use outreach_engine::domain::TemplateType;
use outreach_engine::ingest::ingest_rows;
use outreach_engine::repository::fake::FakeEmailRepository;
use outreach_engine::repository::fake::FakeRecipientRepository;
use outreach_engine::repository::EmailRepository;
use outreach_engine::repository::RecipientRepository;
use uuid::Uuid;

use crate::support;

fn row(
    email: &str,
    initial_date: &str,
    followups: &[(&str, &str)],
) -> Vec<String> {
    let mut columns = vec![email.to_string(), initial_date.to_string()];
    for (date, status) in followups {
        columns.push(date.to_string());
        columns.push(status.to_string());
    }
    columns
}

#[tokio::test]
async fn s5_external_ingestion_links_followup_to_initial() {
    support::init_tracing();
    let recipient_repo = FakeRecipientRepository::default();
    let email_repo = FakeEmailRepository::default();
    let sender = support::sender();

    let recipient = support::recipient("a@x.com");
    recipient_repo.save(recipient.clone(), support::recipient_metadata(Uuid::new_v4())).await.unwrap();

    let rows = vec![row("a@x.com", "2024-05-01", &[("2024-05-08", "Gesendet")])];
    let written = ingest_rows(&rows, &sender, &recipient_repo, &email_repo).await.unwrap();
    assert_eq!(written, 2);

    let all = email_repo.find_by_recipient(recipient.id).await.unwrap();
    let initial = all.iter().find(|e| e.entity.email_type == TemplateType::ExternallyInitial).unwrap();
    let followup = all.iter().find(|e| e.entity.email_type == TemplateType::ExternallyFollowUp).unwrap();

    assert_eq!(initial.metadata.status, EmailStatus::Sent);
    assert_eq!(initial.metadata.initial_email_id, Some(initial.entity.id));
    assert_eq!(followup.metadata.followup_number, 1);
    assert_eq!(followup.metadata.status, EmailStatus::Sent);
    assert_eq!(followup.metadata.initial_email_id, Some(initial.entity.id));
}

#[tokio::test]
async fn invariant_10_reingesting_same_rows_creates_no_duplicates() {
    support::init_tracing();
    let recipient_repo = FakeRecipientRepository::default();
    let email_repo = FakeEmailRepository::default();
    let sender = support::sender();

    let recipient = support::recipient("dup@x.com");
    recipient_repo.save(recipient.clone(), support::recipient_metadata(Uuid::new_v4())).await.unwrap();

    let rows = vec![row("dup@x.com", "2024-05-01", &[("2024-05-08", "Gesendet"), ("2024-05-15", "Offen")])];

    let first = ingest_rows(&rows, &sender, &recipient_repo, &email_repo).await.unwrap();
    assert_eq!(first, 3);

    let second = ingest_rows(&rows, &sender, &recipient_repo, &email_repo).await.unwrap();
    assert_eq!(second, 0, "re-ingesting the identical rows must not duplicate any external email");

    let all = email_repo.find_by_recipient(recipient.id).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn row_with_unparseable_initial_date_is_skipped_without_error() {
    support::init_tracing();
    let recipient_repo = FakeRecipientRepository::default();
    let email_repo = FakeEmailRepository::default();
    let sender = support::sender();

    let recipient = support::recipient("skip@x.com");
    recipient_repo.save(recipient.clone(), support::recipient_metadata(Uuid::new_v4())).await.unwrap();

    let rows = vec![row("skip@x.com", "not-a-date", &[])];
    let written = ingest_rows(&rows, &sender, &recipient_repo, &email_repo).await.unwrap();
    assert_eq!(written, 0);
}
