//! Placeholder Resolver (C8): turns a stored template into a ready-to-send
//! `(subject, body)` pair by batch-reading the cells a recipient's row
//! addresses. Follows §4.4's five steps exactly.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::domain::Contact;
use crate::domain::Recipient;
use crate::domain::RecipientMetadata;
use crate::domain::SpreadsheetReference;
use crate::domain::Template;
use crate::error::EngineError;
use crate::gateway::SheetCell;
use crate::gateway::SpreadsheetGateway;

/// Everything the resolver needs to look up a recipient's row, split out of
/// the repository ports so unit tests can supply one without spinning up the
/// full engine.
pub trait RecipientRowLookup {
    fn metadata_for(
        &self,
        recipient_id: Uuid,
    ) -> Option<&RecipientMetadata>;

    fn contact_for(
        &self,
        contact_id: Uuid,
    ) -> Option<&Contact>;
}

pub struct PlaceholderResolver<'a, G: SpreadsheetGateway> {
    gateway: &'a G,
    spreadsheet_id: String,
}

impl<'a, G: SpreadsheetGateway> PlaceholderResolver<'a, G> {
    pub fn new(
        gateway: &'a G,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self { gateway, spreadsheet_id: spreadsheet_id.into() }
    }

    /// Resolve one template for one recipient. Steps 1-6 of §4.4: validate,
    /// locate the recipient's row via its contact, batch-read the referenced
    /// cells, and substitute.
    pub async fn resolve(
        &self,
        template: &Template,
        recipient: &Recipient,
        lookup: &impl RecipientRowLookup,
    ) -> Result<(String, String), EngineError> {
        let metadata = lookup
            .metadata_for(recipient.id)
            .ok_or_else(|| EngineError::not_found(format!("recipient metadata for {}", recipient.id)))?;
        let contact = lookup
            .contact_for(metadata.contact_id)
            .ok_or_else(|| EngineError::not_found(format!("contact for recipient {}", recipient.id)))?;

        let fetched = self.fetch_column_values(template, &contact.row).await?;

        template.resolve_with_fetched(&fetched).map_err(EngineError::resolution)
    }

    /// Steps 3-5: form `Cell(sheetTitle, column∘row)` for each column
    /// placeholder, batch-read them in one call preserving request order, and
    /// build the key -> value map.
    async fn fetch_column_values(
        &self,
        template: &Template,
        recipient_row: &SpreadsheetReference,
    ) -> Result<BTreeMap<String, String>, EngineError> {
        let requests = template.cell_requests(recipient_row).map_err(EngineError::resolution)?;
        if requests.is_empty() {
            return Ok(BTreeMap::new());
        }

        let refs: Vec<SheetCell> = requests
            .iter()
            .map(|(_, reference)| SheetCell {
                spreadsheet_id: self.spreadsheet_id.clone(),
                reference: reference.clone(),
            })
            .collect();

        let values = self.gateway.read_batch(&refs).await?;

        Ok(requests
            .into_iter()
            .zip(values)
            .map(|((key, _), range)| (key, range.first_or_empty()))
            .collect())
    }
}
