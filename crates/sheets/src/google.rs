//! [`TableBackend`] over the Google Sheets v4 REST API.
//!
//! Tables are sheets (tabs) of one spreadsheet. Named ranges are spreadsheet-global in
//! Sheets, so listing and updating filter them by the owning sheet id.

use std::time::Duration;

use async_trait::async_trait;
use rackbot_core::config::SheetsConfig;
use reqwest::{Method, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::auth::{token_provider, TokenProvider};
use crate::backend::{check_write_shape, BackendError, NamedRange, PluRow, TableBackend};
use crate::range::{quote_table_name, RowRange, COLUMN_COUNT, FIRST_COLUMN, LAST_COLUMN};

const METADATA_FIELDS: &str = "sheets.properties(sheetId,title),namedRanges";
/// Light green behind rack headers.
const HEADER_BACKGROUND: (f64, f64, f64) = (0.75, 0.92, 0.61);
/// Pale cyan behind rack data rows.
const DATA_BACKGROUND: (f64, f64, f64) = (0.85, 1.0, 1.0);
const HEADER_FONT_SIZE: u32 = 15;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
    #[serde(default)]
    named_ranges: Vec<ApiNamedRange>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiNamedRange {
    named_range_id: String,
    name: String,
    range: GridRange,
}

/// Zero-based, end-exclusive grid coordinates as the API reports them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct GridRange {
    #[serde(default)]
    sheet_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_row_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_row_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_column_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_column_index: Option<u32>,
}

impl GridRange {
    fn from_rows(sheet_id: i64, range: &RowRange) -> Self {
        Self {
            sheet_id,
            start_row_index: Some(range.first - 1),
            end_row_index: range.last,
            start_column_index: Some(0),
            end_column_index: Some(COLUMN_COUNT as u32),
        }
    }

    fn to_rows(&self) -> RowRange {
        let first = self.start_row_index.unwrap_or(0) + 1;
        match self.end_row_index {
            Some(end) => RowRange::rows(first, end),
            None => RowRange::open(first),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: String,
}

pub struct GoogleSheetsBackend {
    client: reqwest::Client,
    api_base_url: String,
    spreadsheet_id: String,
    tokens: Box<dyn TokenProvider>,
}

impl GoogleSheetsBackend {
    pub fn new(
        client: reqwest::Client,
        api_base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        tokens: Box<dyn TokenProvider>,
    ) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
            tokens,
        }
    }

    pub fn from_config(config: &SheetsConfig) -> Result<Self, BackendError> {
        let credentials = config
            .credentials()
            .map_err(|error| BackendError::InvalidArgument(error.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|error| BackendError::Fatal(format!("failed to build http client: {error}")))?;
        let tokens = token_provider(&client, &credentials, &config.token_url);
        Ok(Self::new(client, config.api_base_url.clone(), config.spreadsheet_id.clone(), tokens))
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut all = vec![self.spreadsheet_id.as_str()];
        all.extend_from_slice(segments);
        api_url(&self.api_base_url, &all)
    }

    /// `values/{a1}{suffix}` where suffix is empty or a method such as `:clear`.
    fn values_url(&self, a1: &str, suffix: &str) -> Result<Url, BackendError> {
        self.url(&["values", &format!("{a1}{suffix}")])
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Value, BackendError> {
        let mut refreshed = false;
        loop {
            let token = self.tokens.access_token().await?;
            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(token.expose_secret());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|error| {
                BackendError::Transient(format!("sheets request failed: {error}"))
            })?;
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !refreshed {
                debug!(event_name = "sheets.auth.retry", "access token rejected, refreshing");
                self.tokens.invalidate().await;
                refreshed = true;
                continue;
            }

            let text = response.text().await.map_err(|error| {
                BackendError::Transient(format!("failed to read sheets response: {error}"))
            })?;
            if !status.is_success() {
                let error = classify(status, &error_message(&text));
                warn!(
                    event_name = "sheets.api.error",
                    method = %method,
                    status = status.as_u16(),
                    error = %error,
                    "sheets api call failed"
                );
                return Err(error);
            }
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|error| {
                BackendError::Fatal(format!("failed to decode sheets response: {error}"))
            });
        }
    }

    async fn metadata(&self) -> Result<SpreadsheetMetadata, BackendError> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut().append_pair("fields", METADATA_FIELDS);
        let value = self.send(Method::GET, url, None).await?;
        decode(value, "spreadsheet metadata")
    }

    async fn batch_update(&self, requests: Vec<Value>) -> Result<Value, BackendError> {
        let url = api_url(&self.api_base_url, &[&format!("{}:batchUpdate", self.spreadsheet_id)])?;
        let body = json!({ "requests": requests });
        self.send(Method::POST, url, Some(&body)).await
    }
}

fn invalid_base(base: &str) -> BackendError {
    BackendError::InvalidArgument(format!("sheets api base url `{base}` cannot carry a path"))
}

/// `{base}/v4/spreadsheets/...` with every segment percent-encoded on its own.
fn api_url(base: &str, segments: &[&str]) -> Result<Url, BackendError> {
    let mut url = Url::parse(base)
        .map_err(|error| BackendError::InvalidArgument(format!("invalid sheets api url: {error}")))?;
    url.path_segments_mut()
        .map_err(|_| invalid_base(base))?
        .pop_if_empty()
        .extend(["v4", "spreadsheets"])
        .extend(segments);
    Ok(url)
}

fn decode<T: for<'de> Deserialize<'de>>(value: Value, what: &str) -> Result<T, BackendError> {
    serde_json::from_value(value)
        .map_err(|error| BackendError::Fatal(format!("unexpected {what} shape: {error}")))
}

/// Pulls `error.message` out of a Google error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn classify(status: StatusCode, message: &str) -> BackendError {
    let message = message.to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::CONFLICT => BackendError::Conflict(message),
        StatusCode::BAD_REQUEST if message.to_ascii_lowercase().contains("already exists") => {
            BackendError::Conflict(message)
        }
        StatusCode::BAD_REQUEST => BackendError::InvalidArgument(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            BackendError::Transient(message)
        }
        status if status.is_server_error() => BackendError::Transient(message),
        status => BackendError::Fatal(format!("{status}: {message}")),
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn sheet_id(metadata: &SpreadsheetMetadata, table: &str) -> Result<i64, BackendError> {
    metadata
        .sheets
        .iter()
        .find(|sheet| sheet.properties.title == table)
        .map(|sheet| sheet.properties.sheet_id)
        .ok_or_else(|| BackendError::NotFound(format!("table `{table}`")))
}

fn color((red, green, blue): (f64, f64, f64)) -> Value {
    json!({ "red": red, "green": green, "blue": blue })
}

/// `batchUpdate` requests styling a rack block: a bold centred header on green, cyan data
/// rows and solid borders around every cell.
fn rack_block_format_requests(sheet_id: i64, header_row: u32, data_rows: u32) -> Vec<Value> {
    let header = GridRange::from_rows(sheet_id, &RowRange::single(header_row));
    let block = GridRange::from_rows(sheet_id, &RowRange::rows(header_row, header_row + data_rows));
    let solid = json!({ "style": "SOLID" });

    let mut requests = vec![json!({
        "repeatCell": {
            "range": header,
            "cell": {
                "userEnteredFormat": {
                    "backgroundColor": color(HEADER_BACKGROUND),
                    "horizontalAlignment": "CENTER",
                    "textFormat": { "bold": true, "fontSize": HEADER_FONT_SIZE },
                }
            },
            "fields": "userEnteredFormat(backgroundColor,horizontalAlignment,textFormat)",
        }
    })];
    if data_rows > 0 {
        let data =
            GridRange::from_rows(sheet_id, &RowRange::rows(header_row + 1, header_row + data_rows));
        requests.push(json!({
            "repeatCell": {
                "range": data,
                "cell": { "userEnteredFormat": { "backgroundColor": color(DATA_BACKGROUND) } },
                "fields": "userEnteredFormat.backgroundColor",
            }
        }));
    }
    requests.push(json!({
        "updateBorders": {
            "range": block,
            "top": solid,
            "bottom": solid,
            "left": solid,
            "right": solid,
            "innerHorizontal": solid,
            "innerVertical": solid,
        }
    }));
    requests
}

fn named_range<'a>(
    metadata: &'a SpreadsheetMetadata,
    sheet_id: i64,
    name: &str,
) -> Result<&'a ApiNamedRange, BackendError> {
    metadata
        .named_ranges
        .iter()
        .find(|named| named.name == name && named.range.sheet_id == sheet_id)
        .ok_or_else(|| BackendError::NotFound(format!("named range `{name}`")))
}

#[async_trait]
impl TableBackend for GoogleSheetsBackend {
    async fn list_tables(&self) -> Result<Vec<String>, BackendError> {
        let metadata = self.metadata().await?;
        Ok(metadata.sheets.into_iter().map(|sheet| sheet.properties.title).collect())
    }

    async fn create_table(&self, name: &str) -> Result<(), BackendError> {
        self.batch_update(vec![json!({ "addSheet": { "properties": { "title": name } } })])
            .await?;
        Ok(())
    }

    async fn delete_table(&self, name: &str) -> Result<(), BackendError> {
        let metadata = self.metadata().await?;
        let sheet_id = sheet_id(&metadata, name)?;
        // Names outlive their sheet in Sheets, so they go in the same batch.
        let mut requests = metadata
            .named_ranges
            .iter()
            .filter(|named| named.range.sheet_id == sheet_id)
            .map(|named| json!({ "deleteNamedRange": { "namedRangeId": named.named_range_id } }))
            .collect::<Vec<_>>();
        requests.push(json!({ "deleteSheet": { "sheetId": sheet_id } }));
        self.batch_update(requests).await?;
        Ok(())
    }

    async fn read_cells(
        &self,
        table: &str,
        range: &RowRange,
    ) -> Result<Vec<PluRow>, BackendError> {
        let mut url = self.values_url(&range.to_a1(table), "")?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");
        let value = self.send(Method::GET, url, None).await?;
        let values: ValueRange = decode(value, "value range")?;

        let mut rows = values
            .values
            .into_iter()
            .map(|cells| {
                let cells = cells.into_iter().take(COLUMN_COUNT).map(cell_text).collect();
                PluRow::from_cells(cells)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(len) = range.len() {
            rows.resize(len as usize, PluRow::default());
        }
        Ok(rows)
    }

    async fn write_cells(
        &self,
        table: &str,
        range: &RowRange,
        rows: &[PluRow],
    ) -> Result<(), BackendError> {
        check_write_shape(range, rows)?;
        let a1 = range.to_a1(table);
        let mut url = self.values_url(&a1, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "USER_ENTERED");
        let body = json!({
            "range": a1,
            "majorDimension": "ROWS",
            "values": rows.iter().map(PluRow::to_cells).collect::<Vec<_>>(),
        });
        self.send(Method::PUT, url, Some(&body)).await?;
        Ok(())
    }

    async fn clear_cells(&self, table: &str, range: &RowRange) -> Result<(), BackendError> {
        let url = self.values_url(&range.to_a1(table), ":clear")?;
        self.send(Method::POST, url, Some(&json!({}))).await?;
        Ok(())
    }

    async fn list_named_ranges(&self, table: &str) -> Result<Vec<NamedRange>, BackendError> {
        let metadata = self.metadata().await?;
        let sheet_id = sheet_id(&metadata, table)?;
        Ok(metadata
            .named_ranges
            .iter()
            .filter(|named| named.range.sheet_id == sheet_id)
            .map(|named| NamedRange { name: named.name.clone(), range: named.range.to_rows() })
            .collect())
    }

    async fn add_named_range(
        &self,
        table: &str,
        name: &str,
        range: &RowRange,
    ) -> Result<(), BackendError> {
        let metadata = self.metadata().await?;
        if metadata.named_ranges.iter().any(|named| named.name == name) {
            return Err(BackendError::Conflict(format!(
                "named range `{name}` already exists in the spreadsheet"
            )));
        }
        let sheet_id = sheet_id(&metadata, table)?;
        self.batch_update(vec![json!({
            "addNamedRange": {
                "namedRange": { "name": name, "range": GridRange::from_rows(sheet_id, range) }
            }
        })])
        .await?;
        Ok(())
    }

    async fn update_named_range(
        &self,
        table: &str,
        name: &str,
        range: &RowRange,
    ) -> Result<(), BackendError> {
        let metadata = self.metadata().await?;
        let sheet_id = sheet_id(&metadata, table)?;
        let named = named_range(&metadata, sheet_id, name)?;
        self.batch_update(vec![json!({
            "updateNamedRange": {
                "namedRange": {
                    "namedRangeId": named.named_range_id,
                    "name": name,
                    "range": GridRange::from_rows(sheet_id, range),
                },
                "fields": "range",
            }
        })])
        .await?;
        Ok(())
    }

    async fn delete_named_range(&self, table: &str, name: &str) -> Result<(), BackendError> {
        let metadata = self.metadata().await?;
        let sheet_id = sheet_id(&metadata, table)?;
        let named = named_range(&metadata, sheet_id, name)?;
        self.batch_update(vec![json!({
            "deleteNamedRange": { "namedRangeId": named.named_range_id }
        })])
        .await?;
        Ok(())
    }

    async fn append_rows(&self, table: &str, rows: &[PluRow]) -> Result<RowRange, BackendError> {
        if rows.is_empty() {
            return Err(BackendError::InvalidArgument("nothing to append".to_string()));
        }
        let a1 = format!("{}!{FIRST_COLUMN}:{LAST_COLUMN}", quote_table_name(table));
        let mut url = self.values_url(&a1, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = json!({
            "majorDimension": "ROWS",
            "values": rows.iter().map(PluRow::to_cells).collect::<Vec<_>>(),
        });
        let value = self.send(Method::POST, url, Some(&body)).await?;
        let response: AppendResponse = decode(value, "append response")?;
        let (_, landed) = RowRange::parse_a1(&response.updates.updated_range)?;
        Ok(landed)
    }

    async fn insert_rows(
        &self,
        table: &str,
        before_row: u32,
        count: u32,
    ) -> Result<(), BackendError> {
        if before_row == 0 || count == 0 {
            return Err(BackendError::InvalidArgument(format!(
                "cannot insert {count} rows before row {before_row}"
            )));
        }
        let metadata = self.metadata().await?;
        let sheet_id = sheet_id(&metadata, table)?;
        self.batch_update(vec![json!({
            "insertDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "ROWS",
                    "startIndex": before_row - 1,
                    "endIndex": before_row - 1 + count,
                },
                "inheritFromBefore": before_row > 1,
            }
        })])
        .await?;
        Ok(())
    }

    async fn delete_rows(&self, table: &str, rows: &[u32]) -> Result<(), BackendError> {
        let mut rows = rows.iter().copied().filter(|row| *row > 0).collect::<Vec<_>>();
        if rows.is_empty() {
            return Ok(());
        }
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();

        let metadata = self.metadata().await?;
        let sheet_id = sheet_id(&metadata, table)?;
        // Bottom-up so earlier deletions do not shift later targets.
        let requests = rows
            .into_iter()
            .map(|row| {
                json!({
                    "deleteDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": row - 1,
                            "endIndex": row,
                        }
                    }
                })
            })
            .collect();
        self.batch_update(requests).await?;
        Ok(())
    }

    async fn format_rack_block(
        &self,
        table: &str,
        header_row: u32,
        data_rows: u32,
    ) -> Result<(), BackendError> {
        if header_row == 0 {
            return Err(BackendError::InvalidArgument("rows are numbered from 1".to_string()));
        }
        let metadata = self.metadata().await?;
        let sheet_id = sheet_id(&metadata, table)?;
        self.batch_update(rack_block_format_requests(sheet_id, header_row, data_rows)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use super::{
        api_url, classify, error_message, rack_block_format_requests, GridRange,
        SpreadsheetMetadata,
    };
    use crate::backend::BackendError;
    use crate::range::RowRange;

    #[test]
    fn grid_ranges_convert_between_zero_and_one_based_rows() {
        let grid = GridRange::from_rows(7, &RowRange::rows(5, 9));
        assert_eq!(grid.start_row_index, Some(4));
        assert_eq!(grid.end_row_index, Some(9));
        assert_eq!(grid.end_column_index, Some(3));
        assert_eq!(grid.to_rows(), RowRange::rows(5, 9));

        let open = GridRange { start_row_index: Some(4), ..GridRange::default() };
        assert_eq!(open.to_rows(), RowRange::open(5));
    }

    #[test]
    fn metadata_defaults_missing_sheet_ids_to_zero() {
        let metadata: SpreadsheetMetadata = serde_json::from_value(json!({
            "sheets": [
                { "properties": { "title": "produk" } },
                { "properties": { "sheetId": 812, "title": "AB12" } }
            ],
            "namedRanges": [
                {
                    "namedRangeId": "nr-1",
                    "name": "Rak_Satu",
                    "range": { "sheetId": 812, "startRowIndex": 1, "endRowIndex": 4 }
                }
            ]
        }))
        .expect("decodes");

        assert_eq!(metadata.sheets[0].properties.sheet_id, 0);
        assert_eq!(super::sheet_id(&metadata, "AB12"), Ok(812));
        assert!(matches!(super::sheet_id(&metadata, "ZZ99"), Err(BackendError::NotFound(_))));
        let named = super::named_range(&metadata, 812, "Rak_Satu").expect("named range");
        assert_eq!(named.range.to_rows(), RowRange::rows(2, 4));
        assert!(super::named_range(&metadata, 0, "Rak_Satu").is_err());
    }

    #[test]
    fn status_codes_map_to_backend_errors() {
        assert!(matches!(classify(StatusCode::NOT_FOUND, "gone"), BackendError::NotFound(_)));
        assert!(matches!(
            classify(StatusCode::BAD_REQUEST, "A sheet with the name \"AB12\" already exists."),
            BackendError::Conflict(_)
        ));
        assert!(matches!(
            classify(StatusCode::BAD_REQUEST, "Invalid range"),
            BackendError::InvalidArgument(_)
        ));
        assert!(classify(StatusCode::TOO_MANY_REQUESTS, "quota").is_transient());
        assert!(classify(StatusCode::SERVICE_UNAVAILABLE, "busy").is_transient());
        assert!(matches!(
            classify(StatusCode::FORBIDDEN, "caller lacks permission"),
            BackendError::Unauthorized(_)
        ));
    }

    #[test]
    fn error_message_prefers_the_google_error_body() {
        let body = r#"{"error":{"code":400,"message":"Unable to parse range","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body), "Unable to parse range");
        assert_eq!(error_message("upstream connect error"), "upstream connect error");
    }

    #[test]
    fn urls_encode_each_segment() {
        let url = api_url("https://sheets.googleapis.com/", &["sheet-id", "values", "'AB 12'!A2:C4"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/'AB%2012'!A2:C4"
        );
    }

    #[test]
    fn rack_block_formatting_covers_header_data_and_borders() {
        let requests = rack_block_format_requests(812, 6, 50);
        assert_eq!(requests.len(), 3);

        let header = &requests[0]["repeatCell"];
        assert_eq!(header["range"]["sheetId"], 812);
        assert_eq!(header["range"]["startRowIndex"], 5);
        assert_eq!(header["range"]["endRowIndex"], 6);
        assert_eq!(header["cell"]["userEnteredFormat"]["textFormat"]["bold"], true);
        assert_eq!(header["cell"]["userEnteredFormat"]["textFormat"]["fontSize"], 15);
        assert_eq!(header["cell"]["userEnteredFormat"]["horizontalAlignment"], "CENTER");

        let data = &requests[1]["repeatCell"];
        assert_eq!(data["range"]["startRowIndex"], 6);
        assert_eq!(data["range"]["endRowIndex"], 56);
        assert_eq!(data["cell"]["userEnteredFormat"]["backgroundColor"]["red"], 0.85);
        assert_eq!(data["fields"], "userEnteredFormat.backgroundColor");

        let borders = &requests[2]["updateBorders"];
        assert_eq!(borders["range"]["startRowIndex"], 5);
        assert_eq!(borders["range"]["endRowIndex"], 56);
        assert_eq!(borders["range"]["endColumnIndex"], 3);
        assert_eq!(borders["innerHorizontal"]["style"], "SOLID");
    }

    #[test]
    fn header_only_block_skips_the_data_fill() {
        let requests = rack_block_format_requests(0, 1, 0);
        assert_eq!(requests.len(), 2);
        assert!(requests[1].get("updateBorders").is_some());
    }
}
