//! The two collaborator abstractions the core consumes (§6): a spreadsheet
//! API and a mail gateway. Both are thin ports at the trait boundary; real
//! HTTP-backed clients live in `sheets`/`mail`, and `fake` holds
//! hand-scripted implementations for tests.

pub mod fake;
pub mod mail;
pub mod sheets;

use crate::domain::ThreadId;
use crate::error::EngineError;

pub type Result<T> = std::result::Result<T, EngineError>;

/// One row of cell values returned for one requested reference.
#[derive(Debug, Clone, Default)]
pub struct ValueRange {
    pub values: Vec<String>,
}

impl ValueRange {
    /// The single-cell convenience accessor the resolver uses: a missing
    /// range or an empty row both render as an empty string per §4.4 step 4.
    pub fn first_or_empty(&self) -> String { self.values.first().cloned().unwrap_or_default() }
}

/// A single (sheet, reference) address, opaque to the gateway beyond what it
/// needs to build a request.
#[derive(Debug, Clone)]
pub struct SheetCell {
    pub spreadsheet_id: String,
    pub reference: crate::domain::SpreadsheetReference,
}

#[allow(async_fn_in_trait)]
pub trait SpreadsheetGateway {
    /// Batch read; preserves input order in the returned `Vec`.
    async fn read_batch(
        &self,
        refs: &[SheetCell],
    ) -> Result<Vec<ValueRange>>;

    async fn write(
        &self,
        cell: &SheetCell,
        value: &str,
    ) -> Result<()>;

    async fn write_batch(
        &self,
        cells: &[SheetCell],
        values: &[String],
    ) -> Result<()> {
        if cells.len() != values.len() {
            return Err(EngineError::validation("write_batch: refs and values must be the same length"));
        }
        for (cell, value) in cells.iter().zip(values) {
            self.write(cell, value).await?;
        }
        Ok(())
    }

    /// Linear search down one column for the first matching value, returning
    /// its 1-based row, if any.
    async fn search_column(
        &self,
        spreadsheet_id: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<u32>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub status: SendStatus,
    pub thread_id: Option<ThreadId>,
    pub error_message: Option<String>,
}

impl SendOutcome {
    pub fn success(thread_id: Option<ThreadId>) -> Self {
        Self { status: SendStatus::Success, thread_id, error_message: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { status: SendStatus::Failure, thread_id: None, error_message: Some(message.into()) }
    }
}

#[allow(async_fn_in_trait)]
pub trait MailGateway {
    async fn send(
        &self,
        email: &crate::domain::Email,
        thread_id: Option<&ThreadId>,
    ) -> Result<SendOutcome>;

    async fn save_draft(
        &self,
        email: &crate::domain::Email,
        thread_id: Option<&ThreadId>,
    ) -> Result<SendOutcome>;

    /// `true` iff the thread contains strictly more messages than
    /// `expected_message_count`.
    async fn has_replies(
        &self,
        thread_id: &ThreadId,
        expected_message_count: u32,
    ) -> Result<bool>;
}
