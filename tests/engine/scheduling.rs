//! Black-box scheduling scenarios composed over the fake repositories,
//! exercising §8's S1/S2 scenarios plus the cross-recipient failure
//! isolation property (one recipient erroring does not abort the rest of
//! the tick).

use chrono::NaiveDate;
use outreach_engine::domain::Contact;
use outreach_engine::domain::EmailEntry;
use outreach_engine::domain::PlanWithTemplate;
use outreach_engine::domain::RecipientMetadata;
use outreach_engine::gateway::fake::FakeSheetsGateway;
use outreach_engine::repository::fake::FakeEmailRepository;
use outreach_engine::repository::EmailRepository;
use outreach_engine::resolver::PlaceholderResolver;
use outreach_engine::resolver::RecipientRowLookup;
use outreach_engine::scheduler::run_tick;
use uuid::Uuid;

use crate::support;

struct MapLookup {
    metadata: std::collections::HashMap<Uuid, RecipientMetadata>,
    contacts: std::collections::HashMap<Uuid, Contact>,
}

impl RecipientRowLookup for MapLookup {
    fn metadata_for(
        &self,
        recipient_id: Uuid,
    ) -> Option<&RecipientMetadata> {
        self.metadata.get(&recipient_id)
    }

    fn contact_for(
        &self,
        contact_id: Uuid,
    ) -> Option<&Contact> {
        self.contacts.get(&contact_id)
    }
}

#[tokio::test]
async fn s1_full_sequence_two_recipients_both_get_full_sequences() {
    support::init_tracing();
    let (plan, templates) = support::two_step_plain_plan();
    let plan_with_template = PlanWithTemplate::new(plan, templates).unwrap();

    let r1 = support::recipient("a@b.com")
        .with_initial_contact_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        .unwrap();
    let r2 = support::recipient("c@d.com")
        .with_initial_contact_date(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap())
        .unwrap();

    let c1 = support::contact("Sheet1", 2);
    let c2 = support::contact("Sheet1", 3);
    let mut metadata = std::collections::HashMap::new();
    metadata.insert(r1.id, support::recipient_metadata(c1.id));
    metadata.insert(r2.id, support::recipient_metadata(c2.id));
    let mut contacts = std::collections::HashMap::new();
    contacts.insert(c1.id, c1.clone());
    contacts.insert(c2.id, c2.clone());
    let lookup = MapLookup { metadata, contacts };

    let gateway = FakeSheetsGateway::default();
    let resolver = PlaceholderResolver::new(&gateway, "sheet-1");
    let repo = FakeEmailRepository::default();
    let sender = support::sender();

    let plans = vec![(plan_with_template, vec![(r1.clone(), c1.id), (r2.clone(), c2.id)])];
    let results = run_tick(&plans, &sender, &lookup, &resolver, &repo).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results.get(&r1.id).unwrap().len(), 2);
    assert_eq!(results.get(&r2.id).unwrap().len(), 2);

    let persisted_r1 = repo.find_by_recipient(r1.id).await.unwrap();
    assert_eq!(persisted_r1[0].metadata.initial_email_id, Some(persisted_r1[0].entity.id));
}

#[tokio::test]
async fn one_recipient_missing_contact_does_not_abort_the_tick() {
    support::init_tracing();
    let (plan, templates) = support::two_step_plain_plan();
    let plan_with_template = PlanWithTemplate::new(plan, templates).unwrap();

    // r1 has no registered metadata/contact -> resolver fails for it.
    let r1 = support::recipient("broken@b.com")
        .with_initial_contact_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        .unwrap();
    let r2 = support::recipient("ok@b.com")
        .with_initial_contact_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        .unwrap();

    let c2 = support::contact("Sheet1", 5);
    let mut metadata = std::collections::HashMap::new();
    metadata.insert(r2.id, support::recipient_metadata(c2.id));
    let mut contacts = std::collections::HashMap::new();
    contacts.insert(c2.id, c2.clone());
    let lookup = MapLookup { metadata, contacts };

    let gateway = FakeSheetsGateway::default();
    let resolver = PlaceholderResolver::new(&gateway, "sheet-1");
    let repo = FakeEmailRepository::default();
    let sender = support::sender();

    let plans = vec![(plan_with_template, vec![(r1.clone(), Uuid::new_v4()), (r2.clone(), c2.id)])];
    let results = run_tick(&plans, &sender, &lookup, &resolver, &repo).await;

    assert!(!results.contains_key(&r1.id));
    assert_eq!(results.get(&r2.id).unwrap().len(), 2);
}

#[tokio::test]
async fn running_schedule_twice_on_quiescent_state_is_deterministic() {
    support::init_tracing();
    let (plan, templates) = support::two_step_plain_plan();
    let plan_with_template_a = PlanWithTemplate::new(plan.clone(), templates.clone()).unwrap();

    let r1 = support::recipient("once@b.com")
        .with_initial_contact_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        .unwrap();
    let c1 = support::contact("Sheet1", 9);
    let mut metadata = std::collections::HashMap::new();
    metadata.insert(r1.id, support::recipient_metadata(c1.id));
    let mut contacts = std::collections::HashMap::new();
    contacts.insert(c1.id, c1.clone());
    let lookup = MapLookup { metadata, contacts };

    let gateway = FakeSheetsGateway::default();
    let resolver = PlaceholderResolver::new(&gateway, "sheet-1");
    let repo = FakeEmailRepository::default();
    let sender = support::sender();

    let plans = vec![(plan_with_template_a, vec![(r1.clone(), c1.id)])];
    let first = run_tick(&plans, &sender, &lookup, &resolver, &repo).await;
    assert_eq!(first.get(&r1.id).unwrap().len(), 2);

    // second tick against the same (now non-empty) repository: SEQUENCE_COMPLETE,
    // nothing new emitted.
    let plan_with_template_b = PlanWithTemplate::new(plan, templates).unwrap();
    let plans_again = vec![(plan_with_template_b, vec![(r1.clone(), c1.id)])];
    let second = run_tick(&plans_again, &sender, &lookup, &resolver, &repo).await;
    assert!(!second.contains_key(&r1.id));

    let persisted: Vec<EmailEntry> = repo.find_by_recipient(r1.id).await.unwrap();
    assert_eq!(persisted.len(), 2);
}
