//! Dispatch Pipeline (C11): turns one selected `(email, metadata)` pair into
//! a send/draft attempt, enforcing the reply gate and the fixed side-effect
//! order from §5 — reply check, then send/draft, then status update, then
//! thread-id binding. Grounded on the teacher's delivery-worker shape: a
//! per-item, idempotent step that is safe to retry because it re-enters at
//! validation rather than assuming any prior step ran.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::EmailEntry;
use crate::domain::EmailStatus;
use crate::domain::ThreadId;
use crate::error::EngineError;
use crate::gateway::MailGateway;
use crate::gateway::SendOutcome;
use crate::gateway::SendStatus;
use crate::repository::EmailRepository;
use crate::repository::RecipientRepository;

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Sent { thread_id: Option<ThreadId> },
    Failed { reason: String },
    SkippedAlreadyReplied,
}

#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub recipient_id: Uuid,
    pub email_id: Uuid,
    pub outcome: DispatchOutcome,
}

/// Dispatch one already-selected pending email. `save_as_draft` routes step 4
/// through `save_draft` instead of `send`; nothing else changes.
pub async fn dispatch_one<M, E, R>(
    entry: &EmailEntry,
    save_as_draft: bool,
    today: NaiveDate,
    mail_gateway: &M,
    email_repo: &E,
    recipient_repo: &R,
) -> Result<DispatchResult, EngineError>
where
    M: MailGateway,
    E: EmailRepository,
    R: RecipientRepository,
{
    let recipient_id = entry.metadata.recipient_id;
    let followup_number = entry.metadata.followup_number;

    let (recipient, recipient_metadata) = recipient_repo
        .find_by_id(recipient_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("recipient {recipient_id}")))?;

    let thread_id = recipient_metadata.thread_id.clone();

    // Step 2: schedule-integrity check. A follow-up with no bound thread id
    // means the initial send never completed or was never linked.
    if followup_number > 0 && thread_id.is_none() {
        return Err(EngineError::validation(format!(
            "recipient {recipient_id} has a follow-up pending with no bound threadId"
        )));
    }

    // Step 3: reply gate, followups only. The persisted flag is checked first
    // so a transiently-false gateway response can never re-open a thread
    // already known to have replied; any failure from the gateway call itself
    // is also treated as "replied" — belt and suspenders on top of the
    // gateway's own fail-closed contract.
    if followup_number > 0 {
        let thread_id = thread_id.clone().expect("checked above");
        let replied =
            recipient.has_replied || mail_gateway.has_replies(&thread_id, followup_number + 1).await.unwrap_or(true);
        if replied {
            let mut updated_recipient = recipient.clone();
            updated_recipient.mark_replied();
            recipient_repo.save(updated_recipient, recipient_metadata.clone()).await?;
            return Ok(DispatchResult {
                recipient_id,
                email_id: entry.entity.id,
                outcome: DispatchOutcome::SkippedAlreadyReplied,
            });
        }
    }

    // Step 4: dispatch.
    let outcome = if save_as_draft {
        mail_gateway.save_draft(&entry.entity, thread_id.as_ref()).await?
    } else {
        mail_gateway.send(&entry.entity, thread_id.as_ref()).await?
    };

    // Step 5: persist outcome.
    let updated_metadata = match outcome.status {
        SendStatus::Success => entry.metadata.mark_sent(today),
        SendStatus::Failure => {
            entry.metadata.mark_failed(outcome.error_message.clone().unwrap_or_default())
        }
    };
    email_repo.save_metadata(entry.entity.id, updated_metadata.clone()).await?;

    // Step 6: post-dispatch thread binding. Initial sends only; follow-ups
    // never rewrite the bound thread id.
    if followup_number == 0
        && updated_metadata.status == EmailStatus::Sent
        && outcome.thread_id.is_some()
    {
        let mut bound_metadata = recipient_metadata.clone();
        bound_metadata.thread_id = outcome.thread_id.clone();
        recipient_repo.save(recipient.clone(), bound_metadata).await?;
    }

    let dispatch_outcome = match outcome {
        SendOutcome { status: SendStatus::Success, thread_id, .. } => DispatchOutcome::Sent { thread_id },
        SendOutcome { status: SendStatus::Failure, error_message, .. } => {
            DispatchOutcome::Failed { reason: error_message.unwrap_or_default() }
        }
    };

    Ok(DispatchResult { recipient_id, email_id: entry.entity.id, outcome: dispatch_outcome })
}

/// Dispatch every selected pending email. Failures from one recipient's
/// dispatch are logged and do not abort the rest, mirroring the Scheduler's
/// isolation policy.
pub async fn dispatch_all<M, E, R>(
    selected: &[EmailEntry],
    save_as_draft: bool,
    today: NaiveDate,
    mail_gateway: &M,
    email_repo: &E,
    recipient_repo: &R,
) -> Vec<DispatchResult>
where
    M: MailGateway,
    E: EmailRepository,
    R: RecipientRepository,
{
    let mut results = Vec::with_capacity(selected.len());
    for entry in selected {
        match dispatch_one(entry, save_as_draft, today, mail_gateway, email_repo, recipient_repo).await {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::warn!(
                    recipient_id = %entry.metadata.recipient_id,
                    email_id = %entry.entity.id,
                    error = %e,
                    "dispatch failed for recipient, continuing with next"
                );
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::dispatch_one;
    use super::DispatchOutcome;
    use crate::domain::Email;
    use crate::domain::EmailAddress;
    use crate::domain::EmailEntry;
    use crate::domain::EmailMetadata;
    use crate::domain::EmailStatus;
    use crate::domain::Recipient;
    use crate::domain::RecipientMetadata;
    use crate::domain::TemplateType;
    use crate::domain::ThreadId;
    use crate::gateway::fake::FakeMailGateway;
    use crate::repository::fake::FakeEmailRepository;
    use crate::repository::fake::FakeRecipientRepository;
    use crate::repository::EmailRepository;
    use crate::repository::RecipientRepository;

    fn entry(
        recipient_id: Uuid,
        followup_number: u32,
        email_type: TemplateType,
    ) -> EmailEntry {
        let entity = Email {
            id: Uuid::new_v4(),
            sender: EmailAddress::parse("s@co.com".to_string()).unwrap(),
            recipient: EmailAddress::parse("r@co.com".to_string()).unwrap(),
            subject: "s".to_string(),
            body: "b".to_string(),
            email_type,
        };
        let metadata = EmailMetadata::new(
            Some(Uuid::new_v4()),
            recipient_id,
            followup_number,
            EmailStatus::Pending,
            None,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            None,
        )
        .unwrap();
        EmailEntry::new(entity, metadata)
    }

    #[tokio::test]
    async fn followup_without_thread_id_is_a_validation_error() {
        let recipient = Recipient::new(Uuid::new_v4(), EmailAddress::parse("r@co.com".to_string()).unwrap(), None);
        let recipient_repo = FakeRecipientRepository::default();
        recipient_repo.save(recipient.clone(), RecipientMetadata::new(Uuid::new_v4())).await.unwrap();
        let email_repo = FakeEmailRepository::default();
        let mail_gateway = FakeMailGateway::default();

        let pending = entry(recipient.id, 1, TemplateType::FollowUp);
        let result = dispatch_one(
            &pending,
            false,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            &mail_gateway,
            &email_repo,
            &recipient_repo,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn successful_initial_send_binds_thread_id_and_marks_sent() {
        let recipient = Recipient::new(Uuid::new_v4(), EmailAddress::parse("r@co.com".to_string()).unwrap(), None);
        let recipient_repo = FakeRecipientRepository::default();
        recipient_repo.save(recipient.clone(), RecipientMetadata::new(Uuid::new_v4())).await.unwrap();
        let email_repo = FakeEmailRepository::default();
        let mail_gateway = FakeMailGateway::default();
        *mail_gateway.next_thread_id.lock().unwrap() = Some(ThreadId::new("t-1".to_string()));

        let pending = entry(recipient.id, 0, TemplateType::Initial);
        email_repo.save(pending.clone()).await.unwrap();

        let result = dispatch_one(
            &pending,
            false,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            &mail_gateway,
            &email_repo,
            &recipient_repo,
        )
        .await
        .unwrap();

        assert!(matches!(result.outcome, DispatchOutcome::Sent { .. }));
        let (_, updated_metadata) = recipient_repo.find_by_id(recipient.id).await.unwrap().unwrap();
        assert_eq!(updated_metadata.thread_id, Some(ThreadId::new("t-1".to_string())));

        let stored = email_repo.find_by_id(pending.entity.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.status, EmailStatus::Sent);
    }

    #[tokio::test]
    async fn reply_gate_skips_send_and_marks_recipient_replied() {
        let recipient = Recipient::new(Uuid::new_v4(), EmailAddress::parse("r@co.com".to_string()).unwrap(), None);
        let recipient_repo = FakeRecipientRepository::default();
        let thread_id = ThreadId::new("t-2".to_string());
        let mut metadata = RecipientMetadata::new(Uuid::new_v4());
        metadata.thread_id = Some(thread_id.clone());
        recipient_repo.save(recipient.clone(), metadata).await.unwrap();

        let email_repo = FakeEmailRepository::default();
        let mail_gateway = FakeMailGateway::default();
        mail_gateway.reply_threads.lock().unwrap().push(thread_id);

        let pending = entry(recipient.id, 1, TemplateType::FollowUp);
        email_repo.save(pending.clone()).await.unwrap();

        let result = dispatch_one(
            &pending,
            false,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            &mail_gateway,
            &email_repo,
            &recipient_repo,
        )
        .await
        .unwrap();

        assert!(matches!(result.outcome, DispatchOutcome::SkippedAlreadyReplied));
        let (updated_recipient, _) = recipient_repo.find_by_id(recipient.id).await.unwrap().unwrap();
        assert!(updated_recipient.has_replied);
        assert!(mail_gateway.sent.lock().unwrap().is_empty());
    }
}
