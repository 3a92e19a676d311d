use chrono::NaiveDate;
use uuid::Uuid;

use super::email_address::EmailAddress;
use super::thread_id::ThreadId;

/// Write-once contact date: once `Some`, a further `set_initial_contact_date`
/// call is rejected rather than silently overwriting it.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: Uuid,
    pub email: EmailAddress,
    pub salutation: Option<String>,
    pub has_replied: bool,
    initial_contact_date: Option<NaiveDate>,
}

impl Recipient {
    pub fn new(
        id: Uuid,
        email: EmailAddress,
        salutation: Option<String>,
    ) -> Self {
        Self { id, email, salutation, has_replied: false, initial_contact_date: None }
    }

    pub fn initial_contact_date(&self) -> Option<NaiveDate> { self.initial_contact_date }

    /// Set the initial contact date. Fails if one is already set — this field
    /// is write-once for the lifetime of the recipient.
    pub fn set_initial_contact_date(
        &mut self,
        date: NaiveDate,
    ) -> Result<(), String> {
        if self.initial_contact_date.is_some() {
            return Err("initial contact date is already set".to_string());
        }
        self.initial_contact_date = Some(date);
        Ok(())
    }

    /// Construct a recipient that already has its initial contact date set,
    /// for callers (ingestion, fixtures) that know the date up front.
    pub fn with_initial_contact_date(
        mut self,
        date: NaiveDate,
    ) -> Result<Self, String> {
        self.set_initial_contact_date(date)?;
        Ok(self)
    }

    pub fn mark_replied(&mut self) { self.has_replied = true; }
}

/// Relational data about a recipient that isn't part of its own identity: the
/// contact row it was sourced from, the plan it's enrolled in (if any), and
/// the gateway thread id bound once an initial email is sent.
#[derive(Debug, Clone)]
pub struct RecipientMetadata {
    pub contact_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub thread_id: Option<ThreadId>,
}

impl RecipientMetadata {
    pub fn new(contact_id: Uuid) -> Self { Self { contact_id, plan_id: None, thread_id: None } }
}
