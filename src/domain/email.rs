use chrono::NaiveDate;
use uuid::Uuid;

use super::email_address::EmailAddress;
use super::template::TemplateType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl EmailStatus {
    pub fn is_terminal(self) -> bool { !matches!(self, Self::Pending) }
}

/// The message itself — sender, recipient, rendered (placeholder-free)
/// subject/body, and a type tag distinguishing internal sends from ingested
/// external history.
#[derive(Debug, Clone)]
pub struct Email {
    pub id: Uuid,
    pub sender: EmailAddress,
    pub recipient: EmailAddress,
    pub subject: String,
    pub body: String,
    pub email_type: TemplateType,
}

impl Email {
    pub fn is_external(&self) -> bool {
        matches!(self.email_type, TemplateType::ExternallyInitial | TemplateType::ExternallyFollowUp)
    }
}

/// Immutable metadata record, enforcing the construction-time invariants from
/// §3: a `Failed` email always carries a non-blank reason, a `Sent` email
/// always carries a sent date, and `followup_number = 0` exactly identifies
/// an initial email.
#[derive(Debug, Clone)]
pub struct EmailMetadata {
    pub initial_email_id: Option<Uuid>,
    pub recipient_id: Uuid,
    pub followup_number: u32,
    pub status: EmailStatus,
    failure_reason: Option<String>,
    pub scheduled_date: NaiveDate,
    pub sent_date: Option<NaiveDate>,
}

impl EmailMetadata {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        initial_email_id: Option<Uuid>,
        recipient_id: Uuid,
        followup_number: u32,
        status: EmailStatus,
        failure_reason: Option<String>,
        scheduled_date: NaiveDate,
        sent_date: Option<NaiveDate>,
    ) -> Result<Self, String> {
        let failure_reason = failure_reason.filter(|r| !r.trim().is_empty());

        if status == EmailStatus::Failed && failure_reason.is_none() {
            return Err("a FAILED email must carry a non-blank failure reason".to_string());
        }
        if status == EmailStatus::Sent && sent_date.is_none() {
            return Err("a SENT email must carry a sent date".to_string());
        }

        Ok(Self {
            initial_email_id,
            recipient_id,
            followup_number,
            status,
            failure_reason,
            scheduled_date,
            sent_date,
        })
    }

    pub fn is_initial(&self) -> bool { self.followup_number == 0 }

    pub fn failure_reason(&self) -> Option<&str> { self.failure_reason.as_deref() }

    /// Reschedule to a new date. Only valid while `Pending`; any other status
    /// is terminal and must not be rescheduled.
    pub fn reschedule(
        &self,
        new_date: NaiveDate,
    ) -> Result<Self, String> {
        if self.status != EmailStatus::Pending {
            return Err("only a PENDING email may be rescheduled".to_string());
        }
        Ok(Self { scheduled_date: new_date, ..self.clone() })
    }

    /// Transition to `Sent`, stamping `sent_date`.
    pub fn mark_sent(
        &self,
        sent_date: NaiveDate,
    ) -> Self {
        Self { status: EmailStatus::Sent, sent_date: Some(sent_date), failure_reason: None, ..self.clone() }
    }

    /// Transition to `Failed`, stamping a non-blank reason.
    pub fn mark_failed(
        &self,
        reason: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() { "unknown failure".to_string() } else { reason };
        Self { status: EmailStatus::Failed, failure_reason: Some(reason), ..self.clone() }
    }

    pub fn mark_cancelled(&self) -> Self { Self { status: EmailStatus::Cancelled, ..self.clone() } }

    /// Bind this follow-up (or self-referencing initial) to its initial email.
    pub fn with_initial_email_id(
        &self,
        initial_email_id: Uuid,
    ) -> Self {
        Self { initial_email_id: Some(initial_email_id), ..self.clone() }
    }
}

/// One persisted (Email, EmailMetadata) pair — the unit the repository ports
/// save and return.
#[derive(Debug, Clone)]
pub struct EntityData<E, M> {
    pub entity: E,
    pub metadata: M,
}

impl<E, M> EntityData<E, M> {
    pub fn new(
        entity: E,
        metadata: M,
    ) -> Self {
        Self { entity, metadata }
    }
}

pub type EmailEntry = EntityData<Email, EmailMetadata>;

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use claims::assert_err;
    use claims::assert_ok;
    use uuid::Uuid;

    use super::EmailMetadata;
    use super::EmailStatus;

    fn date() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() }

    #[test]
    fn failed_requires_reason() {
        assert_err!(EmailMetadata::new(None, Uuid::new_v4(), 0, EmailStatus::Failed, None, date(), None));
        assert_err!(EmailMetadata::new(
            None,
            Uuid::new_v4(),
            0,
            EmailStatus::Failed,
            Some("   ".to_string()),
            date(),
            None
        ));
        assert_ok!(EmailMetadata::new(
            None,
            Uuid::new_v4(),
            0,
            EmailStatus::Failed,
            Some("timeout".to_string()),
            date(),
            None
        ));
    }

    #[test]
    fn sent_requires_sent_date() {
        assert_err!(EmailMetadata::new(None, Uuid::new_v4(), 0, EmailStatus::Sent, None, date(), None));
        assert_ok!(EmailMetadata::new(
            None,
            Uuid::new_v4(),
            0,
            EmailStatus::Sent,
            None,
            date(),
            Some(date())
        ));
    }

    #[test]
    fn blank_failure_reason_normalized_to_none_on_pending() {
        let m = assert_ok!(EmailMetadata::new(
            None,
            Uuid::new_v4(),
            1,
            EmailStatus::Pending,
            Some("   ".to_string()),
            date(),
            None
        ));
        assert_eq!(m.failure_reason(), None);
    }

    #[test]
    fn reschedule_only_valid_while_pending() {
        let pending = assert_ok!(EmailMetadata::new(
            None,
            Uuid::new_v4(),
            0,
            EmailStatus::Pending,
            None,
            date(),
            None
        ));
        let later = date().succ_opt().unwrap();
        assert_ok!(pending.reschedule(later));

        let sent = pending.mark_sent(date());
        assert_err!(sent.reschedule(later));
    }

    #[test]
    fn followup_number_zero_identifies_initial() {
        let m = assert_ok!(EmailMetadata::new(
            None,
            Uuid::new_v4(),
            0,
            EmailStatus::Pending,
            None,
            date(),
            None
        ));
        assert!(m.is_initial());
    }
}
