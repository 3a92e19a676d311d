//! Shared fixtures for the black-box engine tests. Mirrors the teacher's
//! `tests/api/helpers.rs` role, minus the HTTP server: there's no listener
//! to bind here, only an in-memory engine built from the fake repositories
//! and gateways.

use once_cell::sync::Lazy;
use outreach_engine::domain::Contact;
use outreach_engine::domain::EmailAddress;
use outreach_engine::domain::FollowUpPlan;
use outreach_engine::domain::FollowUpStep;
use outreach_engine::domain::PlaceholderStore;
use outreach_engine::domain::PlanType;
use outreach_engine::domain::Recipient;
use outreach_engine::domain::RecipientMetadata;
use outreach_engine::domain::Template;
use outreach_engine::domain::TemplateType;
use outreach_engine::telemetry::get_subscriber;
use outreach_engine::telemetry::init_subscriber;
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        init_subscriber(get_subscriber("test", "debug", std::io::stdout));
    } else {
        init_subscriber(get_subscriber("test", "debug", std::io::sink));
    }
});

pub fn init_tracing() { Lazy::force(&TRACING); }

pub fn sender() -> EmailAddress { EmailAddress::parse("outreach@co.com".to_string()).unwrap() }

pub fn recipient(email: &str) -> Recipient { Recipient::new(Uuid::new_v4(), EmailAddress::parse(email.to_string()).unwrap(), None) }

pub fn contact(
    sheet_title: &str,
    row: u32,
) -> Contact {
    Contact::new(Uuid::new_v4(), sheet_title, row, None, None, None).unwrap()
}

pub fn recipient_metadata(contact_id: Uuid) -> RecipientMetadata { RecipientMetadata::new(contact_id) }

/// A two-step plan (initial + one follow-up, 3-day wait) with placeholder-
/// free templates, for scheduling scenarios that don't exercise resolution.
pub fn two_step_plain_plan() -> (FollowUpPlan, Vec<Template>) {
    let t0 = Template::new(
        Uuid::new_v4(),
        TemplateType::Initial,
        "Hello".to_string(),
        "Hi there".to_string(),
        PlaceholderStore::default_delimiters(),
    )
    .unwrap();
    let t1 = Template::new(
        Uuid::new_v4(),
        TemplateType::FollowUp,
        "Just checking in".to_string(),
        "Following up".to_string(),
        PlaceholderStore::default_delimiters(),
    )
    .unwrap();
    let plan = FollowUpPlan::new(
        Uuid::new_v4(),
        PlanType::Default,
        vec![
            FollowUpStep { step_number: 0, wait_days: 0, template_id: t0.id },
            FollowUpStep { step_number: 1, wait_days: 3, template_id: t1.id },
        ],
    )
    .unwrap();
    (plan, vec![t0, t1])
}
