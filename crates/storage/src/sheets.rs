use std::sync::Arc;
use std::time::Duration;

use artisan_core::SheetValues;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::TokenSource;
use crate::error::StorageError;
use crate::traits::TableStore;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Google Sheets v4 `values` API. `store_id` names the tab within the
/// configured spreadsheet. A bearer token is fetched from `tokens` for
/// every request.
pub struct SheetsStore {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsStore {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
        base_url: Option<String>,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            spreadsheet_id: spreadsheet_id.into(),
            tokens,
        })
    }

    fn values_url(&self, range: &str) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StorageError::Config(format!("base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Config(format!("base url {} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Http { status: status.as_u16(), body })
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_value_range(body: &str) -> Result<SheetValues, StorageError> {
    let range: ValueRange =
        serde_json::from_str(body).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(range
        .values
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect())
}

#[async_trait]
impl TableStore for SheetsStore {
    async fn load_table(&self, store_id: &str) -> Result<SheetValues, StorageError> {
        let url = self.values_url(store_id)?;
        tracing::debug!(%url, "sheets values.get");
        let token = self.tokens.token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;
        parse_value_range(&body)
    }

    /// Overwrites from `A1` down. Rows past the end of `values` are left
    /// as they were; tables here only grow.
    async fn store_table(&self, store_id: &str, values: &[Vec<String>]) -> Result<(), StorageError> {
        let range = format!("{store_id}!A1");
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        tracing::debug!(%url, rows = values.len(), "sheets values.update");
        let token = self.tokens.token().await?;
        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": values,
            }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
