//! Pending Selector (C10): from the persisted store, choose at most one next
//! email per recipient for dispatch. Pure function over already-loaded
//! emails — no I/O — so the Dispatch Pipeline can call it directly against
//! whatever `find_pending_scheduled_before` returned.

use std::collections::HashMap;

use chrono::Days;
use chrono::NaiveDate;

use crate::domain::EmailEntry;
use crate::error::EngineError;
use crate::repository::EmailRepository;

/// `repo.findPendingScheduledBefore(today + 1 day)`, then the three-step
/// filter/group/pick described in §4.6.
pub async fn select_pending(
    repo: &impl EmailRepository,
    today: NaiveDate,
) -> Result<Vec<EmailEntry>, EngineError> {
    let cutoff = today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| EngineError::invariant(format!("{today} + 1 day overflows the representable date range")))?;
    let candidates = repo.find_pending_scheduled_before(cutoff).await?;
    Ok(select_from(candidates))
}

/// The filter/group/pick logic in isolation, for tests that want to hand it
/// a fixed candidate list without a repository.
pub fn select_from(candidates: Vec<EmailEntry>) -> Vec<EmailEntry> {
    let mut by_recipient: HashMap<_, Vec<EmailEntry>> = HashMap::new();

    for entry in candidates {
        if entry.entity.is_external() {
            continue;
        }
        by_recipient.entry(entry.metadata.recipient_id).or_default().push(entry);
    }

    let mut selected: Vec<EmailEntry> = by_recipient
        .into_values()
        .filter_map(|mut group| {
            group.sort_by_key(|e| e.metadata.followup_number);
            group.into_iter().next()
        })
        .collect();

    // Deterministic output order for callers/tests; selection order itself
    // is immaterial per recipient group.
    selected.sort_by_key(|e| e.metadata.recipient_id);
    selected
}
