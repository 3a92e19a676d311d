//! Hand-scripted test doubles for both gateway traits. Used by scheduler/
//! resolver/dispatch unit tests in place of `wiremock` contract tests, which
//! exercise the real `reqwest`-backed clients in `tests/`.

use std::collections::HashMap;
use std::sync::Mutex;

use super::MailGateway;
use super::Result;
use super::SendOutcome;
use super::SheetCell;
use super::SpreadsheetGateway;
use super::ValueRange;
use crate::domain::Email;
use crate::domain::ThreadId;

/// Cell values keyed by `"{spreadsheet_id}!{a1}"`. Missing keys read as empty,
/// matching the real gateway's "missing cell -> empty string" contract.
#[derive(Default)]
pub struct FakeSheetsGateway {
    pub cells: Mutex<HashMap<String, String>>,
}

impl FakeSheetsGateway {
    pub fn set(
        &self,
        spreadsheet_id: &str,
        a1: &str,
        value: &str,
    ) {
        self.cells.lock().unwrap().insert(format!("{spreadsheet_id}!{a1}"), value.to_string());
    }
}

impl SpreadsheetGateway for FakeSheetsGateway {
    async fn read_batch(
        &self,
        refs: &[SheetCell],
    ) -> Result<Vec<ValueRange>> {
        let cells = self.cells.lock().unwrap();
        Ok(refs
            .iter()
            .map(|c| {
                let key = format!("{}!{}", c.spreadsheet_id, c.reference.to_a1());
                ValueRange { values: vec![cells.get(&key).cloned().unwrap_or_default()] }
            })
            .collect())
    }

    async fn write(
        &self,
        cell: &SheetCell,
        value: &str,
    ) -> Result<()> {
        self.set(&cell.spreadsheet_id, &cell.reference.to_a1(), value);
        Ok(())
    }

    async fn search_column(
        &self,
        spreadsheet_id: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<u32>> {
        let cells = self.cells.lock().unwrap();
        let prefix = format!("{spreadsheet_id}!{column}");
        let mut matches: Vec<(u32, &String)> = cells
            .iter()
            .filter_map(|(key, v)| {
                let rest = key.strip_prefix(&prefix)?;
                rest.parse::<u32>().ok().map(|row| (row, v))
            })
            .collect();
        matches.sort_by_key(|(row, _)| *row);
        Ok(matches.into_iter().find(|(_, v)| v.as_str() == value).map(|(row, _)| row))
    }
}

/// Scripted replies/outcomes for `MailGateway`. `reply_threads` holds thread
/// ids that should report as replied; `next_thread_id` is returned by `send`
/// on an initial (threadless) send.
pub struct FakeMailGateway {
    pub reply_threads: Mutex<Vec<ThreadId>>,
    pub next_thread_id: Mutex<Option<ThreadId>>,
    pub fail_sends: Mutex<bool>,
    pub sent: Mutex<Vec<Email>>,
}

impl Default for FakeMailGateway {
    fn default() -> Self {
        Self {
            reply_threads: Mutex::new(Vec::new()),
            next_thread_id: Mutex::new(None),
            fail_sends: Mutex::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl MailGateway for FakeMailGateway {
    async fn send(
        &self,
        email: &Email,
        thread_id: Option<&ThreadId>,
    ) -> Result<SendOutcome> {
        if *self.fail_sends.lock().unwrap() {
            return Ok(SendOutcome::failure("simulated failure"));
        }
        self.sent.lock().unwrap().push(email.clone());
        let bound = thread_id.cloned().or_else(|| self.next_thread_id.lock().unwrap().clone());
        Ok(SendOutcome::success(bound))
    }

    async fn save_draft(
        &self,
        email: &Email,
        thread_id: Option<&ThreadId>,
    ) -> Result<SendOutcome> {
        self.send(email, thread_id).await
    }

    async fn has_replies(
        &self,
        thread_id: &ThreadId,
        _expected_message_count: u32,
    ) -> Result<bool> {
        Ok(self.reply_threads.lock().unwrap().contains(thread_id))
    }
}
