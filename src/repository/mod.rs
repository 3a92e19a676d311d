//! Abstract repository ports (C7). Each aggregate gets one port offering
//! save-with-metadata, find-by-id, list, and find-by-recipient (where that
//! makes sense). Concrete implementations live in `postgres` (production) and
//! `fake` (tests) — both behind `#[cfg(...)]`-free trait objects so the
//! Scheduler/Selector/Dispatch Pipeline/Ingestor never know which one they're
//! talking to, mirroring the teacher's explicit-dependency-passing
//! composition root rather than a repository singleton.

pub mod fake;
pub mod postgres;

use uuid::Uuid;

use crate::domain::Contact;
use crate::domain::EmailEntry;
use crate::domain::EmailMetadata;
use crate::domain::FollowUpPlan;
use crate::domain::PlanWithTemplate;
use crate::domain::Recipient;
use crate::domain::RecipientMetadata;
use crate::domain::Template;
use crate::error::EngineError;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Persists Email aggregates. `save` is the one-transaction-per-pair write
/// described in §5: `(email, metadata)` both succeed or both fail.
#[allow(async_fn_in_trait)]
pub trait EmailRepository {
    async fn save(
        &self,
        entry: EmailEntry,
    ) -> Result<EmailEntry>;

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<EmailEntry>>;

    async fn list(&self) -> Result<Vec<EmailEntry>>;

    /// Canonical iteration order: ascending `followup_number`.
    async fn find_by_recipient(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<EmailEntry>>;

    /// All `Pending` emails with `scheduled_date < before`, across all
    /// recipients and types (the Pending Selector filters externals itself).
    async fn find_pending_scheduled_before(
        &self,
        before: chrono::NaiveDate,
    ) -> Result<Vec<EmailEntry>>;

    /// Update just the metadata half of an already-persisted pair (used by
    /// the dispatch pipeline after send/draft outcomes).
    async fn save_metadata(
        &self,
        email_id: Uuid,
        metadata: EmailMetadata,
    ) -> Result<()>;
}

pub trait RecipientRepository {
    #[allow(async_fn_in_trait)]
    async fn save(
        &self,
        recipient: Recipient,
        metadata: RecipientMetadata,
    ) -> Result<()>;

    #[allow(async_fn_in_trait)]
    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<(Recipient, RecipientMetadata)>>;

    #[allow(async_fn_in_trait)]
    async fn list(&self) -> Result<Vec<(Recipient, RecipientMetadata)>>;

    #[allow(async_fn_in_trait)]
    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(Recipient, RecipientMetadata)>>;
}

pub trait ContactRepository {
    #[allow(async_fn_in_trait)]
    async fn save(
        &self,
        contact: Contact,
    ) -> Result<Contact>;

    #[allow(async_fn_in_trait)]
    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<Contact>>;

    #[allow(async_fn_in_trait)]
    async fn list(&self) -> Result<Vec<Contact>>;
}

pub trait TemplateRepository {
    #[allow(async_fn_in_trait)]
    async fn save(
        &self,
        template: Template,
    ) -> Result<Template>;

    #[allow(async_fn_in_trait)]
    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<Template>>;

    #[allow(async_fn_in_trait)]
    async fn list(&self) -> Result<Vec<Template>>;
}

pub trait PlanRepository {
    #[allow(async_fn_in_trait)]
    async fn save(
        &self,
        plan: FollowUpPlan,
    ) -> Result<FollowUpPlan>;

    #[allow(async_fn_in_trait)]
    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<FollowUpPlan>>;

    #[allow(async_fn_in_trait)]
    async fn list(&self) -> Result<Vec<FollowUpPlan>>;

    /// All active plans, each with its steps' templates resolved and
    /// attached — what the Scheduler actually iterates over.
    #[allow(async_fn_in_trait)]
    async fn list_with_templates(&self) -> Result<Vec<PlanWithTemplate>>;
}
