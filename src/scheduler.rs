//! Scheduler (C9): the core state machine. Per (plan, recipient) pair,
//! decides whether to emit nothing, a full sequence, or a resumed partial
//! sequence, resolving each template's placeholders before persisting so the
//! stored body never carries a placeholder token.

use std::collections::HashMap;

use chrono::Days;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::Email;
use crate::domain::EmailAddress;
use crate::domain::EmailEntry;
use crate::domain::EmailMetadata;
use crate::domain::EmailStatus;
use crate::domain::PlanWithTemplate;
use crate::domain::Recipient;
use crate::domain::TemplateType;
use crate::error::EngineError;
use crate::gateway::SpreadsheetGateway;
use crate::repository::EmailRepository;
use crate::resolver::PlaceholderResolver;
use crate::resolver::RecipientRowLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStatus {
    NoSchedulingRequired,
    NoEmailsScheduled,
    SequenceComplete,
    PartialSequenceScheduled,
}

/// Classify a (recipient, existing emails, plan) triple per §4.5. Checked in
/// this order because a recipient without an initial contact date can never
/// have a non-empty `existing` set produced by this engine — the check still
/// comes first so it always wins if both conditions somehow hold. A replied
/// recipient is treated the same as one needing no scheduling: once
/// `has_replied` is true the scheduler emits nothing new, regardless of how
/// far through the plan the recipient got.
pub fn classify(
    recipient: &Recipient,
    existing: &[EmailEntry],
    max_followup_index: u32,
) -> SchedulingStatus {
    if recipient.initial_contact_date().is_none() || recipient.has_replied {
        return SchedulingStatus::NoSchedulingRequired;
    }
    if existing.is_empty() {
        return SchedulingStatus::NoEmailsScheduled;
    }
    let current = existing.iter().map(|e| e.metadata.followup_number).max().unwrap_or(0);
    if current >= max_followup_index {
        SchedulingStatus::SequenceComplete
    } else {
        SchedulingStatus::PartialSequenceScheduled
    }
}

fn find_initial(existing: &[EmailEntry]) -> Option<&EmailEntry> {
    existing
        .iter()
        .find(|e| matches!(e.entity.email_type, TemplateType::Initial | TemplateType::ExternallyInitial))
}

fn add_days(
    date: NaiveDate,
    days: u32,
) -> Result<NaiveDate, EngineError> {
    date.checked_add_days(Days::new(days as u64))
        .ok_or_else(|| EngineError::invariant(format!("{date} + {days} days overflows the representable date range")))
}

fn with_reply_prefix(subject: &str) -> String {
    if subject.trim_start().starts_with("Re:") {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// Per-recipient scheduling decision and emission. Returns the newly
/// persisted emails (empty for NO_SCHEDULING_REQUIRED / SEQUENCE_COMPLETE).
pub async fn schedule_recipient<G, R, L>(
    plan: &PlanWithTemplate,
    recipient: &Recipient,
    sender: &EmailAddress,
    lookup: &L,
    resolver: &PlaceholderResolver<'_, G>,
    email_repo: &R,
) -> Result<Vec<EmailEntry>, EngineError>
where
    G: SpreadsheetGateway,
    R: EmailRepository,
    L: RecipientRowLookup,
{
    let existing = email_repo.find_by_recipient(recipient.id).await?;
    let status = classify(recipient, &existing, plan.max_followup_index());

    match status {
        SchedulingStatus::NoSchedulingRequired | SchedulingStatus::SequenceComplete => Ok(Vec::new()),
        SchedulingStatus::NoEmailsScheduled => {
            schedule_full_sequence(plan, recipient, sender, lookup, resolver, email_repo).await
        }
        SchedulingStatus::PartialSequenceScheduled => {
            schedule_resume(plan, recipient, sender, &existing, lookup, resolver, email_repo).await
        }
    }
}

async fn render(
    plan: &PlanWithTemplate,
    step_number: u32,
    recipient: &Recipient,
    lookup: &impl RecipientRowLookup,
    resolver: &PlaceholderResolver<'_, impl SpreadsheetGateway>,
) -> Result<(String, String), EngineError> {
    let template = plan
        .template_for_step(step_number)
        .ok_or_else(|| EngineError::invariant(format!("no template bound to step {step_number}")))?;
    resolver.resolve(template, recipient, lookup).await
}

async fn schedule_full_sequence<G, R, L>(
    plan: &PlanWithTemplate,
    recipient: &Recipient,
    sender: &EmailAddress,
    lookup: &L,
    resolver: &PlaceholderResolver<'_, G>,
    email_repo: &R,
) -> Result<Vec<EmailEntry>, EngineError>
where
    G: SpreadsheetGateway,
    R: EmailRepository,
    L: RecipientRowLookup,
{
    let initial_date = recipient
        .initial_contact_date()
        .ok_or_else(|| EngineError::invariant("full sequence requires an initial contact date"))?;

    let (subject, body) = render(plan, 0, recipient, lookup, resolver).await?;
    let email = Email {
        id: Uuid::new_v4(),
        sender: sender.clone(),
        recipient: recipient.email.clone(),
        subject,
        body,
        email_type: TemplateType::Initial,
    };
    let metadata =
        EmailMetadata::new(None, recipient.id, 0, EmailStatus::Pending, None, initial_date, None)
            .map_err(EngineError::validation)?;
    let initial_id = email.id;
    let saved = email_repo.save(EmailEntry::new(email, metadata)).await?;

    // Self-reference: now that the initial email has an assigned id, bind it
    // to itself and persist again.
    let self_bound_metadata = saved.metadata.with_initial_email_id(initial_id);
    email_repo.save_metadata(initial_id, self_bound_metadata.clone()).await?;

    let mut out = vec![EmailEntry::new(saved.entity, self_bound_metadata)];
    let mut prev_scheduled = initial_date;

    for step in plan.plan.steps().iter().filter(|s| s.step_number > 0) {
        let (subject, body) = render(plan, step.step_number, recipient, lookup, resolver).await?;
        let scheduled = add_days(prev_scheduled, step.wait_days)?;
        let email = Email {
            id: Uuid::new_v4(),
            sender: sender.clone(),
            recipient: recipient.email.clone(),
            subject: with_reply_prefix(&subject),
            body,
            email_type: TemplateType::FollowUp,
        };
        let metadata = EmailMetadata::new(
            Some(initial_id),
            recipient.id,
            step.step_number,
            EmailStatus::Pending,
            None,
            scheduled,
            None,
        )
        .map_err(EngineError::validation)?;
        let saved = email_repo.save(EmailEntry::new(email, metadata)).await?;
        prev_scheduled = scheduled;
        out.push(saved);
    }

    Ok(out)
}

#[allow(clippy::too_many_arguments)]
async fn schedule_resume<G, R, L>(
    plan: &PlanWithTemplate,
    recipient: &Recipient,
    sender: &EmailAddress,
    existing: &[EmailEntry],
    lookup: &L,
    resolver: &PlaceholderResolver<'_, G>,
    email_repo: &R,
) -> Result<Vec<EmailEntry>, EngineError>
where
    G: SpreadsheetGateway,
    R: EmailRepository,
    L: RecipientRowLookup,
{
    let initial = find_initial(existing)
        .ok_or_else(|| EngineError::not_found(format!("initial email for recipient {}", recipient.id)))?;
    let current = existing.iter().map(|e| e.metadata.followup_number).max().unwrap_or(0);
    let last = existing
        .iter()
        .find(|e| e.metadata.followup_number == current)
        .ok_or_else(|| EngineError::invariant(format!("no email at followup_number {current}")))?;

    let initial_id = initial.entity.id;
    let mut base = last.metadata.scheduled_date;
    let mut out = Vec::new();

    for step_number in (current + 1)..=plan.max_followup_index() {
        let step =
            plan.plan.step(step_number).ok_or_else(|| EngineError::invariant(format!("missing step {step_number}")))?;
        let (subject, body) = render(plan, step_number, recipient, lookup, resolver).await?;
        let scheduled = add_days(base, step.wait_days)?;
        let email = Email {
            id: Uuid::new_v4(),
            sender: sender.clone(),
            recipient: recipient.email.clone(),
            subject: with_reply_prefix(&subject),
            body,
            email_type: TemplateType::FollowUp,
        };
        let metadata = EmailMetadata::new(
            Some(initial_id),
            recipient.id,
            step_number,
            EmailStatus::Pending,
            None,
            scheduled,
            None,
        )
        .map_err(EngineError::validation)?;
        let saved = email_repo.save(EmailEntry::new(email, metadata)).await?;
        base = scheduled;
        out.push(saved);
    }

    Ok(out)
}

/// Run the scheduler across every (plan, recipient) pair for one tick. A
/// failure for one recipient is logged and does not abort the rest; same for
/// a failure that spans a whole plan's recipient list.
pub async fn run_tick<G, R, L>(
    plans: &[(PlanWithTemplate, Vec<(Recipient, Uuid)>)],
    sender: &EmailAddress,
    lookup: &L,
    resolver: &PlaceholderResolver<'_, G>,
    email_repo: &R,
) -> HashMap<Uuid, Vec<EmailEntry>>
where
    G: SpreadsheetGateway,
    R: EmailRepository,
    L: RecipientRowLookup,
{
    let mut results: HashMap<Uuid, Vec<EmailEntry>> = HashMap::new();

    for (plan, recipients) in plans {
        for (recipient, _contact_id) in recipients {
            match schedule_recipient(plan, recipient, sender, lookup, resolver, email_repo).await {
                Ok(emitted) => {
                    if !emitted.is_empty() {
                        results.entry(recipient.id).or_default().extend(emitted);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        recipient_id = %recipient.id,
                        plan_id = %plan.plan.id,
                        error = %e,
                        "scheduling failed for recipient, continuing with next"
                    );
                }
            }
        }
    }

    results
}
