//! In-memory implementations of every C7 port, used by the scheduler/
//! dispatch/ingestor test suites instead of spinning up Postgres. Mirrors the
//! teacher's preference for fast, dependency-free unit tests around domain
//! logic, reserving the database for black-box tests of the repository layer
//! itself.

use std::sync::Mutex;

use chrono::NaiveDate;
use uuid::Uuid;

use super::ContactRepository;
use super::EmailRepository;
use super::PlanRepository;
use super::RecipientRepository;
use super::Result;
use super::TemplateRepository;
use crate::domain::Contact;
use crate::domain::EmailEntry;
use crate::domain::EmailMetadata;
use crate::domain::FollowUpPlan;
use crate::domain::PlanWithTemplate;
use crate::domain::Recipient;
use crate::domain::RecipientMetadata;
use crate::domain::Template;
use crate::error::EngineError;

#[derive(Default)]
pub struct FakeEmailRepository {
    entries: Mutex<Vec<EmailEntry>>,
}

impl EmailRepository for FakeEmailRepository {
    async fn save(
        &self,
        entry: EmailEntry,
    ) -> Result<EmailEntry> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.iter_mut().find(|e| e.entity.id == entry.entity.id) {
            *existing = entry.clone();
        } else {
            entries.push(entry.clone());
        }
        Ok(entry)
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<EmailEntry>> {
        Ok(self.entries.lock().unwrap().iter().find(|e| e.entity.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<EmailEntry>> { Ok(self.entries.lock().unwrap().clone()) }

    async fn find_by_recipient(
        &self,
        recipient_id: Uuid,
    ) -> Result<Vec<EmailEntry>> {
        let mut found: Vec<EmailEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.metadata.recipient_id == recipient_id)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.metadata.followup_number);
        Ok(found)
    }

    async fn find_pending_scheduled_before(
        &self,
        before: NaiveDate,
    ) -> Result<Vec<EmailEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.metadata.status == crate::domain::EmailStatus::Pending
                    && e.metadata.scheduled_date < before
            })
            .cloned()
            .collect())
    }

    async fn save_metadata(
        &self,
        email_id: Uuid,
        metadata: EmailMetadata,
    ) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .iter_mut()
            .find(|e| e.entity.id == email_id)
            .ok_or_else(|| EngineError::not_found(format!("email {email_id}")))?;
        entry.metadata = metadata;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRecipientRepository {
    recipients: Mutex<Vec<(Recipient, RecipientMetadata)>>,
}

impl RecipientRepository for FakeRecipientRepository {
    async fn save(
        &self,
        recipient: Recipient,
        metadata: RecipientMetadata,
    ) -> Result<()> {
        let mut recipients = self.recipients.lock().unwrap();
        if let Some(existing) = recipients.iter_mut().find(|(r, _)| r.id == recipient.id) {
            *existing = (recipient, metadata);
        } else {
            recipients.push((recipient, metadata));
        }
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<(Recipient, RecipientMetadata)>> {
        Ok(self.recipients.lock().unwrap().iter().find(|(r, _)| r.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<(Recipient, RecipientMetadata)>> {
        Ok(self.recipients.lock().unwrap().clone())
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(Recipient, RecipientMetadata)>> {
        Ok(self
            .recipients
            .lock()
            .unwrap()
            .iter()
            .find(|(r, _)| r.email.as_ref() == email)
            .cloned())
    }
}

#[derive(Default)]
pub struct FakeContactRepository {
    contacts: Mutex<Vec<Contact>>,
}

impl ContactRepository for FakeContactRepository {
    async fn save(
        &self,
        contact: Contact,
    ) -> Result<Contact> {
        let mut contacts = self.contacts.lock().unwrap();
        if let Some(existing) = contacts.iter_mut().find(|c| c.id == contact.id) {
            *existing = contact.clone();
        } else {
            contacts.push(contact.clone());
        }
        Ok(contact)
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<Contact>> {
        Ok(self.contacts.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Contact>> { Ok(self.contacts.lock().unwrap().clone()) }
}

#[derive(Default)]
pub struct FakeTemplateRepository {
    templates: Mutex<Vec<Template>>,
}

impl TemplateRepository for FakeTemplateRepository {
    async fn save(
        &self,
        template: Template,
    ) -> Result<Template> {
        let mut templates = self.templates.lock().unwrap();
        if let Some(pos) = templates.iter().position(|t| t.id == template.id) {
            templates[pos] = template.clone();
        } else {
            templates.push(template.clone());
        }
        Ok(template)
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<Template>> {
        Ok(self.templates.lock().unwrap().iter().find(|t| t.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Template>> { Ok(self.templates.lock().unwrap().clone()) }
}

#[derive(Default)]
pub struct FakePlanRepository {
    plans: Mutex<Vec<FollowUpPlan>>,
    templates: Mutex<Vec<Template>>,
}

impl FakePlanRepository {
    /// Register a template so `list_with_templates` can resolve a plan's
    /// steps to their bound templates.
    pub fn register_template(
        &self,
        template: Template,
    ) {
        self.templates.lock().unwrap().push(template);
    }
}

impl PlanRepository for FakePlanRepository {
    async fn save(
        &self,
        plan: FollowUpPlan,
    ) -> Result<FollowUpPlan> {
        let mut plans = self.plans.lock().unwrap();
        plans.retain(|p| p.id != plan.id);
        plans.push(plan.clone());
        Ok(plan)
    }

    async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<FollowUpPlan>> {
        Ok(self.plans.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<FollowUpPlan>> { Ok(self.plans.lock().unwrap().clone()) }

    async fn list_with_templates(&self) -> Result<Vec<PlanWithTemplate>> {
        let plans = self.plans.lock().unwrap().clone();
        let templates = self.templates.lock().unwrap().clone();
        let mut out = Vec::with_capacity(plans.len());
        for plan in plans {
            let mut step_templates = Vec::with_capacity(plan.steps().len());
            for step in plan.steps() {
                let template = templates
                    .iter()
                    .find(|t| t.id == step.template_id)
                    .cloned()
                    .ok_or_else(|| EngineError::not_found(format!("template {}", step.template_id)))?;
                step_templates.push(template);
            }
            out.push(
                PlanWithTemplate::new(plan, step_templates)
                    .map_err(EngineError::validation)?,
            );
        }
        Ok(out)
    }
}
