use uuid::Uuid;

use super::reference::SpreadsheetReference;

/// The spreadsheet row a recipient originates from, plus the free-text fields
/// carried alongside it. `row` is always a `Row` reference, never a cell or
/// range — a contact is bound to exactly one spreadsheet row.
#[derive(Debug, Clone)]
pub struct Contact {
    pub id: Uuid,
    pub sheet_title: String,
    pub row: SpreadsheetReference,
    pub name: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
}

impl Contact {
    pub fn new(
        id: Uuid,
        sheet_title: impl Into<String>,
        row_number: u32,
        name: Option<String>,
        website: Option<String>,
        phone: Option<String>,
    ) -> Result<Self, String> {
        let row = SpreadsheetReference::row(row_number)?;
        Ok(Self { id, sheet_title: sheet_title.into(), row, name, website, phone })
    }

    pub fn row_number(&self) -> u32 {
        self.row.row_number().expect("Contact::row is always a Row reference")
    }
}
