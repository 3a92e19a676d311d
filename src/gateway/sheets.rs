//! `reqwest`-backed implementation of `SpreadsheetGateway` against a
//! Sheets-API-shaped REST surface. Follows the teacher's `EmailClient` shape:
//! one owned `reqwest::Client` (connection reuse), a base URL, and a bearer
//! token. `readBatch`/`writeBatch` map to one HTTP call each; `searchColumn`
//! has no server-side endpoint assumed, so it degrades to a client-side scan
//! over one `readBatch` call, per §6.

use std::time::Duration;

use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;

use super::Result;
use super::SheetCell;
use super::SpreadsheetGateway;
use super::ValueRange;
use crate::error::EngineError;

pub struct HttpSheetsGateway {
    http_client: reqwest::Client,
    base_url: String,
    access_token: Secret<String>,
}

impl HttpSheetsGateway {
    pub fn new(
        base_url: String,
        access_token: Secret<String>,
        timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder().timeout(timeout).build().expect("TLS backend must initialize");
        Self { http_client, base_url, access_token }
    }

    fn url(
        &self,
        spreadsheet_id: &str,
        path: &str,
    ) -> String {
        format!("{}/v4/spreadsheets/{}{}", self.base_url, urlencoding::encode(spreadsheet_id), path)
    }
}

#[derive(Serialize)]
struct BatchGetRequest<'a> {
    ranges: &'a [String],
}

#[derive(Deserialize)]
struct BatchGetResponse {
    #[serde(rename = "valueRanges")]
    value_ranges: Vec<RawValueRange>,
}

#[derive(Deserialize, Default)]
struct RawValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct WriteRange {
    range: String,
    values: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct BatchUpdateRequest {
    #[serde(rename = "valueInputOption")]
    value_input_option: &'static str,
    data: Vec<WriteRange>,
}

fn to_gateway_error(e: reqwest::Error) -> EngineError {
    if e.is_timeout() {
        EngineError::Gateway(anyhow::anyhow!("timeout"))
    } else {
        EngineError::Gateway(anyhow::Error::new(e))
    }
}

impl SpreadsheetGateway for HttpSheetsGateway {
    #[tracing::instrument(skip(self))]
    async fn read_batch(
        &self,
        refs: &[SheetCell],
    ) -> Result<Vec<ValueRange>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        let spreadsheet_id = &refs[0].spreadsheet_id;
        let ranges: Vec<String> = refs.iter().map(|c| c.reference.to_a1()).collect();

        let response = self
            .http_client
            .get(self.url(spreadsheet_id, "/values:batchGet"))
            .bearer_auth(self.access_token.expose_secret())
            .query(&ranges.iter().map(|r| ("ranges", r.as_str())).collect::<Vec<_>>())
            .send()
            .await
            .map_err(to_gateway_error)?;

        let body: BatchGetResponse = response.json().await.map_err(to_gateway_error)?;

        // §4.4 step 4: missing cells (gateway returns empty) yield empty string.
        Ok(body
            .value_ranges
            .into_iter()
            .map(|vr| ValueRange { values: vr.values.into_iter().flatten().collect() })
            .collect())
    }

    #[tracing::instrument(skip(self, value))]
    async fn write(
        &self,
        cell: &SheetCell,
        value: &str,
    ) -> Result<()> {
        self.write_batch(std::slice::from_ref(cell), std::slice::from_ref(&value.to_string())).await
    }

    #[tracing::instrument(skip(self, values))]
    async fn write_batch(
        &self,
        cells: &[SheetCell],
        values: &[String],
    ) -> Result<()> {
        if cells.len() != values.len() {
            return Err(EngineError::validation("write_batch: refs and values must be the same length"));
        }
        if cells.is_empty() {
            return Ok(());
        }
        let spreadsheet_id = &cells[0].spreadsheet_id;
        let data = cells
            .iter()
            .zip(values)
            .map(|(cell, value)| WriteRange { range: cell.reference.to_a1(), values: vec![vec![value.clone()]] })
            .collect();

        self.http_client
            .post(self.url(spreadsheet_id, "/values:batchUpdate"))
            .bearer_auth(self.access_token.expose_secret())
            .json(&BatchUpdateRequest { value_input_option: "RAW", data })
            .send()
            .await
            .map_err(to_gateway_error)?
            .error_for_status()
            .map_err(to_gateway_error)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn search_column(
        &self,
        spreadsheet_id: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<u32>> {
        let whole_column = crate::domain::SpreadsheetReference::column(column.to_string())
            .map_err(EngineError::validation)?;
        let cell = SheetCell { spreadsheet_id: spreadsheet_id.to_string(), reference: whole_column };
        let ranges = self.read_batch(std::slice::from_ref(&cell)).await?;
        let column_values = ranges.first().map(|r| r.values.as_slice()).unwrap_or(&[]);
        Ok(column_values.iter().position(|v| v == value).map(|index| index as u32 + 1))
    }
}
