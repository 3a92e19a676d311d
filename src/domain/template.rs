use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use super::placeholder::is_balanced;
use super::placeholder::PlaceholderStore;
use super::placeholder::PlaceholderValue;
use super::reference::SpreadsheetReference;

/// The four template roles a message can play. Externally-initiated types are
/// never resolved or sent by this engine — they exist only so ingested
/// history can be told apart from emails the scheduler itself created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateType {
    Initial,
    FollowUp,
    ExternallyInitial,
    ExternallyFollowUp,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub id: Uuid,
    pub template_type: TemplateType,
    subject: String,
    body: String,
    pub placeholders: PlaceholderStore,
}

impl Template {
    pub fn new(
        id: Uuid,
        template_type: TemplateType,
        subject: String,
        body: String,
        placeholders: PlaceholderStore,
    ) -> Result<Self, String> {
        let subject = subject.trim().to_string();
        let body = body.trim().to_string();
        if subject.is_empty() {
            return Err("template subject must not be empty".to_string());
        }
        if body.is_empty() {
            return Err("template body must not be empty".to_string());
        }
        let (open, close) = placeholders.delimiters();
        if !is_balanced(&subject, open, close) || !is_balanced(&body, open, close) {
            return Err("template subject/body has unbalanced placeholder delimiters".to_string());
        }
        Ok(Self { id, template_type, subject, body, placeholders })
    }

    pub fn subject(&self) -> &str { &self.subject }

    pub fn body(&self) -> &str { &self.body }

    /// Two-phase resolution: combine the recipient's row with each
    /// column-reference placeholder to produce cell references (phase a),
    /// then substitute using the caller-supplied fetched values (phase b/c).
    /// `fetched` maps placeholder key -> fetched cell text, already in the
    /// shape the resolver built from a single batch read.
    pub fn resolve_with_fetched(
        &self,
        fetched: &BTreeMap<String, String>,
    ) -> Result<(String, String), String> {
        let subject = self.placeholders.replace_with_overrides(&self.subject, fetched)?;
        let body = self.placeholders.replace_with_overrides(&self.body, fetched)?;
        Ok((subject, body))
    }

    /// Column references this template needs resolved for `recipient`, paired
    /// with the concrete `Cell` reference derived from the recipient's row.
    pub fn cell_requests(
        &self,
        recipient_row: &SpreadsheetReference,
    ) -> Result<Vec<(String, SpreadsheetReference)>, String> {
        let row = recipient_row.row_number()?;
        self.placeholders
            .column_placeholders()
            .map(|(key, column_ref)| {
                let column = column_ref.column_letter()?;
                Ok((key.to_string(), SpreadsheetReference::cell(column, row)?))
            })
            .collect()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum WireValue {
    #[serde(rename = "STRING")]
    String { value: String },
    #[serde(rename = "SPREADSHEET_REFERENCE")]
    SpreadsheetReference { value: WireReference },
}

#[derive(Serialize, Deserialize)]
struct WireReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    row: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cell: Option<String>,
}

/// Serialize a placeholder store to the §6 JSON-equivalent format: one object
/// keyed by placeholder key, each value tagged `STRING` or
/// `SPREADSHEET_REFERENCE`.
pub fn serialize_placeholders(store: &PlaceholderStore) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for key in store.list_keys() {
        let value = store.get(key).expect("key just listed");
        let wire = match value {
            PlaceholderValue::String(s) => WireValue::String { value: s.clone() },
            PlaceholderValue::Column(r) => WireValue::SpreadsheetReference {
                value: reference_to_wire(r),
            },
        };
        map.insert(key.to_string(), serde_json::to_value(wire).expect("wire value serializes"));
    }
    serde_json::Value::Object(map)
}

fn reference_to_wire(r: &SpreadsheetReference) -> WireReference {
    match r {
        SpreadsheetReference::Column(c) => {
            WireReference { column: Some(c.clone()), row: None, cell: None }
        }
        SpreadsheetReference::Row(n) => {
            WireReference { column: None, row: Some(n.to_string()), cell: None }
        }
        SpreadsheetReference::Cell(c, n) => {
            WireReference { column: None, row: None, cell: Some(format!("{c}{n}")) }
        }
        other => WireReference { column: None, row: None, cell: Some(other.to_a1()) },
    }
}

/// Deserialize the §6 JSON-equivalent format back into a `PlaceholderStore`
/// bound to the given delimiter pair.
pub fn deserialize_placeholders(
    json: &serde_json::Value,
    open: char,
    close: char,
) -> Result<PlaceholderStore, String> {
    let mut store = PlaceholderStore::new(open, close)?;
    let obj = json.as_object().ok_or("placeholders_json must be an object")?;
    for (key, raw) in obj {
        let wire: WireValue = serde_json::from_value(raw.clone())
            .map_err(|e| format!("invalid placeholder value for {key:?}: {e}"))?;
        match wire {
            WireValue::String { value } => store.add_string(key.clone(), value)?,
            WireValue::SpreadsheetReference { value } => {
                let reference = wire_to_reference(&value)?;
                store.add_column(key.clone(), reference)?;
            }
        }
    }
    Ok(store)
}

fn wire_to_reference(w: &WireReference) -> Result<SpreadsheetReference, String> {
    if let Some(c) = &w.column {
        return SpreadsheetReference::column(c.clone());
    }
    if let Some(r) = &w.row {
        let n: u32 = r.parse().map_err(|_| format!("invalid row: {r:?}"))?;
        return SpreadsheetReference::row(n);
    }
    if let Some(c) = &w.cell {
        return SpreadsheetReference::of_cell(c);
    }
    Err("spreadsheet reference must have exactly one of column/row/cell".to_string())
}
