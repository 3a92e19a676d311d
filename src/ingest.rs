//! External-History Ingestor (C12): reads one row per spreadsheet entry at
//! fixed column offsets and turns it into `EXTERNALLY_INITIAL`/
//! `EXTERNALLY_FOLLOW_UP` emails, linked to each other and reconciled against
//! whatever internal history the Scheduler has already produced.
//!
//! Linking doesn't need a second persist pass the way the Scheduler's
//! initial-email self-reference does: ids here are client-generated UUIDs
//! assigned before any repository call, so an `EXTERNALLY_INITIAL`'s id is
//! known at construction time and its follow-ups can be linked to it in the
//! same pass, before anything is persisted.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::Email;
use crate::domain::EmailAddress;
use crate::domain::EmailEntry;
use crate::domain::EmailMetadata;
use crate::domain::EmailStatus;
use crate::domain::TemplateType;
use crate::error::EngineError;
use crate::repository::EmailRepository;
use crate::repository::RecipientRepository;

const MAX_FOLLOWUPS: u32 = 8;

#[derive(Debug, Clone)]
pub struct ParsedFollowUp {
    pub step_number: u32,
    pub scheduled_date: NaiveDate,
    pub status: EmailStatus,
    pub raw_status: String,
}

#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub recipient_emails: Vec<EmailAddress>,
    pub initial_contact_date: NaiveDate,
    pub followups: Vec<ParsedFollowUp>,
}

/// Localized, closed status-string map from §4.8. Anything outside the four
/// known strings maps to FAILED with a caller-visible warning.
pub fn parse_status(raw: &str) -> EmailStatus {
    match raw {
        "Offen" => EmailStatus::Pending,
        "Gesendet" => EmailStatus::Sent,
        "Nicht erforderlich" => EmailStatus::Cancelled,
        "Failed" => EmailStatus::Failed,
        _ => EmailStatus::Failed,
    }
}

/// Parse one raw row into a `ParsedRow`, or `None` if it must be skipped
/// outright (missing/unparseable initial contact date). Invalid recipient
/// addresses are dropped individually with a warning rather than skipping
/// the whole row.
pub fn parse_row(columns: &[String]) -> Option<ParsedRow> {
    let raw_emails = columns.first()?;
    let recipient_emails: Vec<EmailAddress> = raw_emails
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match EmailAddress::parse(s.to_string()) {
            Ok(addr) => Some(addr),
            Err(e) => {
                tracing::warn!(raw = %s, error = %e, "dropping invalid recipient address in ingestion row");
                None
            }
        })
        .collect();

    let initial_contact_date = match columns.get(1).and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()) {
        Some(date) => date,
        None => {
            tracing::warn!("skipping ingestion row: missing or unparseable initial contact date");
            return None;
        }
    };

    let mut followups = Vec::new();
    for k in 1..=MAX_FOLLOWUPS {
        let date_offset = (2 + 2 * (k - 1)) as usize;
        let status_offset = date_offset + 1;
        let Some(raw_date) = columns.get(date_offset).filter(|s| !s.trim().is_empty()) else {
            break;
        };
        let Some(scheduled_date) = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").ok() else {
            break;
        };
        let raw_status = columns.get(status_offset).cloned().unwrap_or_default();
        if !matches!(raw_status.as_str(), "Offen" | "Gesendet" | "Nicht erforderlich" | "Failed") {
            tracing::warn!(step = k, raw_status = %raw_status, "unrecognized follow-up status string, treating as FAILED");
        }
        followups.push(ParsedFollowUp {
            step_number: k,
            scheduled_date,
            status: parse_status(&raw_status),
            raw_status,
        });
    }

    Some(ParsedRow { recipient_emails, initial_contact_date, followups })
}

fn failure_reason_for(raw_status: &str) -> Option<String> {
    if raw_status == "Failed" {
        Some("ingested as Failed".to_string())
    } else {
        Some(format!("unrecognized status string: {raw_status:?}"))
    }
}

/// Build the (unlinked against the repository, but self-consistent) entries
/// for one recipient's row. The `EXTERNALLY_INITIAL` is already
/// self-referencing; follow-ups already point at it.
fn build_entries(
    parsed: &ParsedRow,
    recipient_id: Uuid,
    recipient_email: &EmailAddress,
    sender: &EmailAddress,
) -> Vec<EmailEntry> {
    let initial_id = Uuid::new_v4();
    let initial_entity = Email {
        id: initial_id,
        sender: sender.clone(),
        recipient: recipient_email.clone(),
        subject: String::new(),
        body: String::new(),
        email_type: TemplateType::ExternallyInitial,
    };
    let initial_metadata = EmailMetadata::new(
        Some(initial_id),
        recipient_id,
        0,
        EmailStatus::Sent,
        None,
        parsed.initial_contact_date,
        Some(parsed.initial_contact_date),
    )
    .expect("externally-initial metadata is always well-formed");

    let mut entries = vec![EmailEntry::new(initial_entity, initial_metadata)];

    for followup in &parsed.followups {
        let entity = Email {
            id: Uuid::new_v4(),
            sender: sender.clone(),
            recipient: recipient_email.clone(),
            subject: String::new(),
            body: String::new(),
            email_type: TemplateType::ExternallyFollowUp,
        };
        let sent_date = (followup.status == EmailStatus::Sent).then_some(followup.scheduled_date);
        let failure_reason =
            (followup.status == EmailStatus::Failed).then(|| failure_reason_for(&followup.raw_status)).flatten();
        let metadata = EmailMetadata::new(
            Some(initial_id),
            recipient_id,
            followup.step_number,
            followup.status,
            failure_reason,
            followup.scheduled_date,
            sent_date,
        )
        .expect("externally-follow-up metadata is always well-formed");
        entries.push(EmailEntry::new(entity, metadata));
    }

    entries
}

/// Skip rule from §4.8: an external email at index `followup_number` is
/// discarded only once the recipient's internal history already extends past
/// that index (`internal_count > followup_number`) — that entry is already
/// represented by the Scheduler's own records. A fresh recipient with no
/// internal emails (`internal_count == 0`) must still admit its
/// `EXTERNALLY_INITIAL` at index 0.
fn should_discard(
    entry: &EmailEntry,
    internal_count_by_recipient: &HashMap<Uuid, usize>,
) -> bool {
    let internal_count = internal_count_by_recipient.get(&entry.metadata.recipient_id).copied().unwrap_or(0);
    internal_count as u32 > entry.metadata.followup_number
}

/// Idempotence guard: an external email already present at this
/// `(recipient_id, followup_number)` means this row was already ingested in
/// a prior run.
fn already_ingested(
    entry: &EmailEntry,
    existing: &[EmailEntry],
) -> bool {
    existing.iter().any(|e| {
        e.entity.is_external()
            && e.metadata.recipient_id == entry.metadata.recipient_id
            && e.metadata.followup_number == entry.metadata.followup_number
    })
}

/// Ingest every row, linking and reconciling against whatever is already
/// persisted, and return the number of new external emails written.
pub async fn ingest_rows<E, R>(
    rows: &[Vec<String>],
    sender: &EmailAddress,
    recipient_repo: &R,
    email_repo: &E,
) -> Result<usize, EngineError>
where
    E: EmailRepository,
    R: RecipientRepository,
{
    let existing = email_repo.list().await?;
    let mut internal_count_by_recipient: HashMap<Uuid, usize> = HashMap::new();
    for e in &existing {
        if !e.entity.is_external() {
            *internal_count_by_recipient.entry(e.metadata.recipient_id).or_insert(0) += 1;
        }
    }

    let mut written = 0usize;

    for columns in rows {
        let Some(parsed) = parse_row(columns) else { continue };

        for recipient_email in &parsed.recipient_emails {
            let Some((recipient, _)) = recipient_repo.find_by_email(recipient_email.as_ref()).await? else {
                tracing::warn!(email = %recipient_email, "ingestion row references an unknown recipient, skipping");
                continue;
            };

            let candidates = build_entries(&parsed, recipient.id, recipient_email, sender);
            for candidate in candidates {
                if should_discard(&candidate, &internal_count_by_recipient) {
                    continue;
                }
                if already_ingested(&candidate, &existing) {
                    continue;
                }
                email_repo.save(candidate).await?;
                written += 1;
            }
        }
    }

    Ok(written)
}
