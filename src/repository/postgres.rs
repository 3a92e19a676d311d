//! Concrete `sqlx`/Postgres implementation of the C7 ports (C13), following
//! the teacher's transaction style in `delivery.rs` and
//! `idempotency/persistence.rs`: one `pool.begin()` per logical write, a
//! single `transaction.commit()` at the end, `sqlx::query!`/`query_as!` for
//! compile-time-checked SQL. The schema matches the relational layout in §6
//! of the spec (`emails`, `recipients`, `contacts`, `templates`,
//! `follow_up_plans`, `follow_up_steps`).

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use super::EmailRepository;
use super::Result;
use crate::domain::Email;
use crate::domain::EmailEntry;
use crate::domain::EmailMetadata;
use crate::domain::EmailStatus;
use crate::domain::EmailAddress;
use crate::domain::TemplateType;
use crate::error::EngineError;

pub struct PgEmailRepository {
    pool: PgPool,
}

impl PgEmailRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn status_to_str(status: EmailStatus) -> &'static str {
    match status {
        EmailStatus::Pending => "PENDING",
        EmailStatus::Sent => "SENT",
        EmailStatus::Failed => "FAILED",
        EmailStatus::Cancelled => "CANCELLED",
    }
}

fn status_from_str(s: &str) -> Result<EmailStatus> {
    match s {
        "PENDING" => Ok(EmailStatus::Pending),
        "SENT" => Ok(EmailStatus::Sent),
        "FAILED" => Ok(EmailStatus::Failed),
        "CANCELLED" => Ok(EmailStatus::Cancelled),
        other => Err(EngineError::Persistence(anyhow::anyhow!("unknown email status in row: {other}"))),
    }
}

fn type_to_str(t: TemplateType) -> &'static str {
    match t {
        TemplateType::Initial => "INITIAL",
        TemplateType::FollowUp => "FOLLOW_UP",
        TemplateType::ExternallyInitial => "EXTERNALLY_INITIAL",
        TemplateType::ExternallyFollowUp => "EXTERNALLY_FOLLOW_UP",
    }
}

fn type_from_str(s: &str) -> Result<TemplateType> {
    match s {
        "INITIAL" => Ok(TemplateType::Initial),
        "FOLLOW_UP" => Ok(TemplateType::FollowUp),
        "EXTERNALLY_INITIAL" => Ok(TemplateType::ExternallyInitial),
        "EXTERNALLY_FOLLOW_UP" => Ok(TemplateType::ExternallyFollowUp),
        other => Err(EngineError::Persistence(anyhow::anyhow!("unknown email type in row: {other}"))),
    }
}

struct Row {
    id: Uuid,
    sender: String,
    recipient: String,
    subject: String,
    body: String,
    email_type: String,
    initial_email_id: Option<Uuid>,
    recipient_id: Uuid,
    followup_number: i32,
    status: String,
    failure_reason: Option<String>,
    scheduled_date: NaiveDate,
    sent_date: Option<NaiveDate>,
}

impl Row {
    fn into_entry(self) -> Result<EmailEntry> {
        let email = Email {
            id: self.id,
            sender: EmailAddress::parse(self.sender).map_err(EngineError::validation)?,
            recipient: EmailAddress::parse(self.recipient).map_err(EngineError::validation)?,
            subject: self.subject,
            body: self.body,
            email_type: type_from_str(&self.email_type)?,
        };
        let metadata = EmailMetadata::new(
            self.initial_email_id,
            self.recipient_id,
            self.followup_number as u32,
            status_from_str(&self.status)?,
            self.failure_reason,
            self.scheduled_date,
            self.sent_date,
        )
        .map_err(EngineError::validation)?;
        Ok(EmailEntry::new(email, metadata))
    }
}

impl EmailRepository for PgEmailRepository {
    #[tracing::instrument(skip_all, fields(email_id = %entry.entity.id))]
    async fn save(
        &self,
        entry: EmailEntry,
    ) -> Result<EmailEntry> {
        let mut transaction =
            self.pool.begin().await.map_err(|e| EngineError::Persistence(e.into()))?;

        sqlx::query!(
            r#"
            INSERT INTO emails
                (id, sender, recipient, subject, body, type)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                subject = EXCLUDED.subject,
                body = EXCLUDED.body
            "#,
            entry.entity.id,
            entry.entity.sender.as_ref(),
            entry.entity.recipient.as_ref(),
            entry.entity.subject,
            entry.entity.body,
            type_to_str(entry.entity.email_type),
        )
        .execute(&mut *transaction)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;

        sqlx::query!(
            r#"
            INSERT INTO email_metadata
                (email_id, initial_email_id, recipient_id, followup_number, status,
                 failure_reason, scheduled_date, sent_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (email_id) DO UPDATE SET
                initial_email_id = EXCLUDED.initial_email_id,
                status = EXCLUDED.status,
                failure_reason = EXCLUDED.failure_reason,
                scheduled_date = EXCLUDED.scheduled_date,
                sent_date = EXCLUDED.sent_date
            "#,
            entry.entity.id,
            entry.metadata.initial_email_id,
            entry.metadata.recipient_id,
            entry.metadata.followup_number as i32,
            status_to_str(entry.metadata.status),
            entry.metadata.failure_reason(),
            entry.metadata.scheduled_date,
            entry.metadata.sent_date,
        )
        .execute(&mut *transaction)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;

        transaction.commit().await.map_err(|e| EngineError::Persistence(e.into()))?;
        Ok(entry)
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<EmailEntry>> {
        let row = sqlx::query_as!(
            Row,
            r#"
            SELECT
                e.id, e.sender, e.recipient, e.subject, e.body, e.type as email_type,
                m.initial_email_id, m.recipient_id, m.followup_number, m.status,
                m.failure_reason, m.scheduled_date, m.sent_date
            FROM emails e JOIN email_metadata m ON m.email_id = e.id
            WHERE e.id = $1
            "#,
            id
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;

        row.map(Row::into_entry).transpose()
    }

    async fn list(&self) -> Result<Vec<EmailEntry>> {
        let rows = sqlx::query_as!(
            Row,
            r#"
            SELECT
                e.id, e.sender, e.recipient, e.subject, e.body, e.type as email_type,
                m.initial_email_id, m.recipient_id, m.followup_number, m.status,
                m.failure_reason, m.scheduled_date, m.sent_date
            FROM emails e JOIN email_metadata m ON m.email_id = e.id
            "#
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;

        rows.into_iter().map(Row::into_entry).collect()
    }

    async fn find_by_recipient(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<EmailEntry>> {
        let rows = sqlx::query_as!(
            Row,
            r#"
            SELECT
                e.id, e.sender, e.recipient, e.subject, e.body, e.type as email_type,
                m.initial_email_id, m.recipient_id, m.followup_number, m.status,
                m.failure_reason, m.scheduled_date, m.sent_date
            FROM emails e JOIN email_metadata m ON m.email_id = e.id
            WHERE m.recipient_id = $1
            ORDER BY m.followup_number ASC
            "#,
            recipient_id
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;

        rows.into_iter().map(Row::into_entry).collect()
    }

    async fn find_pending_scheduled_before(
        &self,
        before: NaiveDate,
    ) -> Result<Vec<EmailEntry>> {
        let rows = sqlx::query_as!(
            Row,
            r#"
            SELECT
                e.id, e.sender, e.recipient, e.subject, e.body, e.type as email_type,
                m.initial_email_id, m.recipient_id, m.followup_number, m.status,
                m.failure_reason, m.scheduled_date, m.sent_date
            FROM emails e JOIN email_metadata m ON m.email_id = e.id
            WHERE m.status = 'PENDING' AND m.scheduled_date < $1
            "#,
            before
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;

        rows.into_iter().map(Row::into_entry).collect()
    }

    #[tracing::instrument(skip_all, fields(email_id = %email_id))]
    async fn save_metadata(
        &self,
        email_id: Uuid,
        metadata: EmailMetadata,
    ) -> Result<()> {
        sqlx::query!(
            r#"
            UPDATE email_metadata SET
                initial_email_id = $2,
                followup_number = $3,
                status = $4,
                failure_reason = $5,
                scheduled_date = $6,
                sent_date = $7
            WHERE email_id = $1
            "#,
            email_id,
            metadata.initial_email_id,
            metadata.followup_number as i32,
            status_to_str(metadata.status),
            metadata.failure_reason(),
            metadata.scheduled_date,
            metadata.sent_date,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;
        Ok(())
    }
}

pub struct PgRecipientRepository {
    pool: PgPool,
}

impl PgRecipientRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

struct RecipientRow {
    id: Uuid,
    email_address: String,
    salutation: Option<String>,
    has_replied: bool,
    initial_contact_date: Option<NaiveDate>,
    contact_id: Uuid,
    plan_id: Option<Uuid>,
    thread_id: Option<String>,
}

impl RecipientRow {
    fn into_pair(self) -> Result<(crate::domain::Recipient, crate::domain::RecipientMetadata)> {
        let email = EmailAddress::parse(self.email_address).map_err(EngineError::validation)?;
        let mut recipient = crate::domain::Recipient::new(self.id, email, self.salutation);
        if let Some(date) = self.initial_contact_date {
            recipient = recipient.with_initial_contact_date(date).map_err(EngineError::validation)?;
        }
        if self.has_replied {
            recipient.mark_replied();
        }
        let metadata = crate::domain::RecipientMetadata {
            contact_id: self.contact_id,
            plan_id: self.plan_id,
            thread_id: self.thread_id.map(crate::domain::ThreadId::new),
        };
        Ok((recipient, metadata))
    }
}

impl super::RecipientRepository for PgRecipientRepository {
    async fn save(
        &self,
        recipient: crate::domain::Recipient,
        metadata: crate::domain::RecipientMetadata,
    ) -> Result<()> {
        sqlx::query!(
            r#"
            INSERT INTO recipients
                (id, email_address, salutation, has_replied, initial_contact_date,
                 contact_id, plan_id, thread_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                has_replied = EXCLUDED.has_replied,
                initial_contact_date = EXCLUDED.initial_contact_date,
                plan_id = EXCLUDED.plan_id,
                thread_id = EXCLUDED.thread_id
            "#,
            recipient.id,
            recipient.email.as_ref(),
            recipient.salutation,
            recipient.has_replied,
            recipient.initial_contact_date(),
            metadata.contact_id,
            metadata.plan_id,
            metadata.thread_id.as_ref().map(|t| t.as_ref().to_string()),
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<(crate::domain::Recipient, crate::domain::RecipientMetadata)>> {
        let row = sqlx::query_as!(
            RecipientRow,
            r#"SELECT id, email_address, salutation, has_replied, initial_contact_date,
                      contact_id, plan_id, thread_id
               FROM recipients WHERE id = $1"#,
            id
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;
        row.map(RecipientRow::into_pair).transpose()
    }

    async fn list(&self) -> Result<Vec<(crate::domain::Recipient, crate::domain::RecipientMetadata)>> {
        let rows = sqlx::query_as!(
            RecipientRow,
            r#"SELECT id, email_address, salutation, has_replied, initial_contact_date,
                      contact_id, plan_id, thread_id
               FROM recipients"#
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;
        rows.into_iter().map(RecipientRow::into_pair).collect()
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(crate::domain::Recipient, crate::domain::RecipientMetadata)>> {
        let row = sqlx::query_as!(
            RecipientRow,
            r#"SELECT id, email_address, salutation, has_replied, initial_contact_date,
                      contact_id, plan_id, thread_id
               FROM recipients WHERE email_address = $1"#,
            email
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;
        row.map(RecipientRow::into_pair).transpose()
    }
}

pub struct PgContactRepository {
    pool: PgPool,
}

impl PgContactRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

struct ContactRow {
    id: Uuid,
    sheet_title: String,
    row: i32,
    name: Option<String>,
    website: Option<String>,
    phone: Option<String>,
}

impl ContactRow {
    fn into_contact(self) -> Result<crate::domain::Contact> {
        crate::domain::Contact::new(self.id, self.sheet_title, self.row as u32, self.name, self.website, self.phone)
            .map_err(EngineError::validation)
    }
}

impl super::ContactRepository for PgContactRepository {
    async fn save(
        &self,
        contact: crate::domain::Contact,
    ) -> Result<crate::domain::Contact> {
        sqlx::query!(
            r#"
            INSERT INTO contacts (id, sheet_title, row, name, website, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, website = EXCLUDED.website,
                                            phone = EXCLUDED.phone
            "#,
            contact.id,
            contact.sheet_title,
            contact.row_number() as i32,
            contact.name,
            contact.website,
            contact.phone,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;
        Ok(contact)
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<crate::domain::Contact>> {
        let row = sqlx::query_as!(
            ContactRow,
            r#"SELECT id, sheet_title, row, name, website, phone FROM contacts WHERE id = $1"#,
            id
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;
        row.map(ContactRow::into_contact).transpose()
    }

    async fn list(&self) -> Result<Vec<crate::domain::Contact>> {
        let rows = sqlx::query_as!(ContactRow, r#"SELECT id, sheet_title, row, name, website, phone FROM contacts"#)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::Persistence(e.into()))?;
        rows.into_iter().map(ContactRow::into_contact).collect()
    }
}

pub struct PgTemplateRepository {
    pool: PgPool,
}

impl PgTemplateRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn template_type_to_str(t: TemplateType) -> &'static str { type_to_str(t) }

fn template_type_from_str(s: &str) -> Result<TemplateType> { type_from_str(s) }

struct TemplateRow {
    id: Uuid,
    template_type: String,
    subject: String,
    body: String,
    placeholders_json: serde_json::Value,
}

impl TemplateRow {
    fn into_template(self) -> Result<crate::domain::Template> {
        let placeholders = crate::domain::deserialize_placeholders(&self.placeholders_json, '{', '}')
            .map_err(EngineError::validation)?;
        crate::domain::Template::new(
            self.id,
            template_type_from_str(&self.template_type)?,
            self.subject,
            self.body,
            placeholders,
        )
        .map_err(EngineError::validation)
    }
}

impl super::TemplateRepository for PgTemplateRepository {
    #[tracing::instrument(skip_all, fields(template_id = %template.id))]
    async fn save(
        &self,
        template: crate::domain::Template,
    ) -> Result<crate::domain::Template> {
        let placeholders_json = crate::domain::serialize_placeholders(&template.placeholders);
        sqlx::query!(
            r#"
            INSERT INTO templates (id, type, subject, body, placeholders_json)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                type = EXCLUDED.type,
                subject = EXCLUDED.subject,
                body = EXCLUDED.body,
                placeholders_json = EXCLUDED.placeholders_json
            "#,
            template.id,
            template_type_to_str(template.template_type),
            template.subject(),
            template.body(),
            placeholders_json,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;
        Ok(template)
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<crate::domain::Template>> {
        let row = sqlx::query_as!(
            TemplateRow,
            r#"SELECT id, type as template_type, subject, body, placeholders_json
               FROM templates WHERE id = $1"#,
            id
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;
        row.map(TemplateRow::into_template).transpose()
    }

    async fn list(&self) -> Result<Vec<crate::domain::Template>> {
        let rows = sqlx::query_as!(
            TemplateRow,
            r#"SELECT id, type as template_type, subject, body, placeholders_json FROM templates"#
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;
        rows.into_iter().map(TemplateRow::into_template).collect()
    }
}

pub struct PgPlanRepository {
    pool: PgPool,
}

impl PgPlanRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn plan_type_to_str(t: crate::domain::PlanType) -> &'static str {
    match t {
        crate::domain::PlanType::Default => "DEFAULT",
        crate::domain::PlanType::Custom => "CUSTOM",
    }
}

fn plan_type_from_str(s: &str) -> Result<crate::domain::PlanType> {
    match s {
        "DEFAULT" => Ok(crate::domain::PlanType::Default),
        "CUSTOM" => Ok(crate::domain::PlanType::Custom),
        other => Err(EngineError::Persistence(anyhow::anyhow!("unknown plan type in row: {other}"))),
    }
}

struct StepRow {
    step_number: i32,
    wait_days: i32,
    template_id: Option<Uuid>,
}

impl super::PlanRepository for PgPlanRepository {
    #[tracing::instrument(skip_all, fields(plan_id = %plan.id))]
    async fn save(
        &self,
        plan: crate::domain::FollowUpPlan,
    ) -> Result<crate::domain::FollowUpPlan> {
        let mut transaction = self.pool.begin().await.map_err(|e| EngineError::Persistence(e.into()))?;

        sqlx::query!(
            r#"
            INSERT INTO follow_up_plans (id, plan_type)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET plan_type = EXCLUDED.plan_type
            "#,
            plan.id,
            plan_type_to_str(plan.plan_type),
        )
        .execute(&mut *transaction)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;

        for step in plan.steps() {
            sqlx::query!(
                r#"
                INSERT INTO follow_up_steps (id, plan_id, step_number, wait_days, template_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (plan_id, step_number) DO UPDATE SET
                    wait_days = EXCLUDED.wait_days,
                    template_id = EXCLUDED.template_id
                "#,
                Uuid::new_v4(),
                plan.id,
                step.step_number as i32,
                step.wait_days as i32,
                step.template_id,
            )
            .execute(&mut *transaction)
            .await
            .map_err(|e| EngineError::Persistence(e.into()))?;
        }

        transaction.commit().await.map_err(|e| EngineError::Persistence(e.into()))?;
        Ok(plan)
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<crate::domain::FollowUpPlan>> {
        let plan_type = sqlx::query_scalar!(r#"SELECT plan_type FROM follow_up_plans WHERE id = $1"#, id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| EngineError::Persistence(e.into()))?;
        let Some(plan_type) = plan_type else { return Ok(None) };

        let steps = self.load_steps(id).await?;
        crate::domain::FollowUpPlan::new(id, plan_type_from_str(&plan_type)?, steps)
            .map(Some)
            .map_err(EngineError::validation)
    }

    async fn list(&self) -> Result<Vec<crate::domain::FollowUpPlan>> {
        let rows = sqlx::query!(r#"SELECT id, plan_type FROM follow_up_plans"#)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::Persistence(e.into()))?;

        let mut plans = Vec::with_capacity(rows.len());
        for row in rows {
            let steps = self.load_steps(row.id).await?;
            plans.push(
                crate::domain::FollowUpPlan::new(row.id, plan_type_from_str(&row.plan_type)?, steps)
                    .map_err(EngineError::validation)?,
            );
        }
        Ok(plans)
    }

    async fn list_with_templates(&self) -> Result<Vec<crate::domain::PlanWithTemplate>> {
        let plans = self.list().await?;
        let templates = PgTemplateRepository::new(self.pool.clone());
        let mut out = Vec::with_capacity(plans.len());
        for plan in plans {
            let mut step_templates = Vec::with_capacity(plan.steps().len());
            for step in plan.steps() {
                let template = templates
                    .find_by_id(step.template_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found(format!("template {}", step.template_id)))?;
                step_templates.push(template);
            }
            out.push(
                crate::domain::PlanWithTemplate::new(plan, step_templates).map_err(EngineError::validation)?,
            );
        }
        Ok(out)
    }
}

impl PgPlanRepository {
    async fn load_steps(
        &self,
        plan_id: Uuid,
    ) -> Result<Vec<crate::domain::FollowUpStep>> {
        let rows = sqlx::query_as!(
            StepRow,
            r#"SELECT step_number, wait_days, template_id FROM follow_up_steps
               WHERE plan_id = $1 ORDER BY step_number ASC"#,
            plan_id
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::Persistence(e.into()))?;

        rows.into_iter()
            .map(|r| {
                let template_id = r
                    .template_id
                    .ok_or_else(|| EngineError::invariant(format!("step {} has no bound template", r.step_number)))?;
                Ok(crate::domain::FollowUpStep {
                    step_number: r.step_number as u32,
                    wait_days: r.wait_days as u32,
                    template_id,
                })
            })
            .collect()
    }
}
