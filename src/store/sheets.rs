//! Google Sheets values-API backend over reqwest.
//!
//! Tables are worksheet names inside one spreadsheet; the inventory matrix
//! may live in a second spreadsheet and is routed by table name. HTTP status
//! codes map onto the transient/permanent fault classes the retry layer
//! understands: 429 → rate limited, 5xx → unavailable, everything else
//! raises as-is.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::StoreError;
use crate::store::traits::TableBackend;

/// Sheets REST backend.
pub struct SheetsBackend {
    api_base: String,
    token: SecretString,
    spreadsheet_id: String,
    /// Routed tables living in another spreadsheet (table name → id).
    routes: Vec<(String, String)>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsBackend {
    pub fn new(
        api_base: impl Into<String>,
        token: SecretString,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            spreadsheet_id: spreadsheet_id.into(),
            routes: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Route a table to a different spreadsheet.
    pub fn with_route(mut self, table: impl Into<String>, spreadsheet_id: impl Into<String>) -> Self {
        self.routes.push((table.into(), spreadsheet_id.into()));
        self
    }

    fn spreadsheet_for(&self, table: &str) -> &str {
        self.routes
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, id)| id.as_str())
            .unwrap_or(&self.spreadsheet_id)
    }

    fn values_url(&self, table: &str, range: Option<&str>) -> String {
        let sheet = self.spreadsheet_for(table);
        match range {
            Some(r) => format!(
                "{}/v4/spreadsheets/{}/values/{}!{}",
                self.api_base, sheet, table, r
            ),
            None => format!("{}/v4/spreadsheets/{}/values/{}", self.api_base, sheet, table),
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(self.token.expose_secret())
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            429 => StoreError::RateLimited,
            s if (500..600).contains(&s) => StoreError::Unavailable(format!("{s}: {body}")),
            s => StoreError::Api { status: s, body },
        })
    }
}

/// Column number (1-based) to its A1 letter prefix.
fn col_letters(mut col: u32) -> String {
    let mut out = String::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        out.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    out
}

#[async_trait]
impl TableBackend for SheetsBackend {
    async fn read_all(&self, table: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let resp = self
            .authorized(self.client.get(self.values_url(table, None)))
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        let resp = Self::check(resp).await?;
        let range: ValueRange = resp
            .json()
            .await
            .map_err(|e| StoreError::Schema(format!("malformed value range: {e}")))?;
        Ok(range.values)
    }

    async fn update_cell(
        &self,
        table: &str,
        row: u32,
        col: u32,
        value: &str,
    ) -> Result<(), StoreError> {
        let a1 = format!("{}{}", col_letters(col), row);
        let body = serde_json::json!({ "values": [[value]] });
        let resp = self
            .authorized(
                self.client
                    .put(self.values_url(table, Some(&a1)))
                    .query(&[("valueInputOption", "USER_ENTERED")])
                    .json(&body),
            )
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn append_row(&self, table: &str, values: &[String]) -> Result<(), StoreError> {
        let url = format!("{}:append", self.values_url(table, None));
        let body = serde_json::json!({ "values": [values] });
        let resp = self
            .authorized(
                self.client
                    .post(url)
                    .query(&[("valueInputOption", "USER_ENTERED")])
                    .json(&body),
            )
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Self::check(resp).await?;
        Ok(())
    }
}
