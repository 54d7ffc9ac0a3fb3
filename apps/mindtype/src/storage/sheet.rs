//! # Remote Spreadsheet Driver
//!
//! Appends records to a Google Sheets worksheet through the v4 values API.
//!
//! - `append` reads row 1; if it is empty the header row is sent together
//!   with the data row, otherwise only the data row
//! - values are sent with `valueInputOption=RAW` so transcripts are never
//!   interpreted as formulas
//! - appends from this process are serialized; concurrent processes rely on
//!   the API's own append semantics
//!
//! The client is blocking (`ureq`); the HTTP layer calls it from the tokio
//! blocking pool.

use crate::config::SheetConfig;
use mindtype_core::export::export_rows;
use mindtype_core::{AppendReceipt, COLUMNS, MindtypeError, ParticipantRecord, RecordStore};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

// =============================================================================
// WIRE TYPES
// =============================================================================

/// The API's `ValueRange` object (only the fields used here).
#[derive(Debug, Default, Serialize, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

// =============================================================================
// CLIENT
// =============================================================================

/// Spreadsheet-backed record store.
pub struct SheetStore {
    agent: ureq::Agent,
    base_url: String,
    tab: String,
    token: String,
    writer: Mutex<()>,
}

impl std::fmt::Debug for SheetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetStore")
            .field("base_url", &self.base_url)
            .field("tab", &self.tab)
            .finish_non_exhaustive()
    }
}

impl SheetStore {
    /// Create a driver for the configured spreadsheet.
    pub fn new(config: &SheetConfig) -> Result<Self, MindtypeError> {
        if config.tab.is_empty() {
            return Err(MindtypeError::Config("sheet tab name is empty".to_string()));
        }
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            base_url: format!(
                "{}/{}",
                config.endpoint.trim_end_matches('/'),
                urlencoding::encode(&config.id)
            ),
            tab: config.tab.clone(),
            token: config.token.clone(),
            writer: Mutex::new(()),
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!("{}/values/{}", self.base_url, urlencoding::encode(range))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Read every row of `range`.
    fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, MindtypeError> {
        let response = self
            .agent
            .get(&self.values_url(range))
            .header("Authorization", &self.bearer())
            .call()
            .map_err(|e| MindtypeError::Persistence(format!("sheet unreachable: {}", e)))?;
        let body: ValueRange = read_json(response)?;
        Ok(body.values)
    }

    /// Append `rows` after the last non-empty row of the tab.
    fn append_values(&self, rows: Vec<Vec<String>>) -> Result<(), MindtypeError> {
        let url = format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.values_url(&format!("{}!A1", self.tab))
        );
        let response = self
            .agent
            .post(&url)
            .header("Authorization", &self.bearer())
            .send_json(&ValueRange { values: rows })
            .map_err(|e| MindtypeError::Persistence(format!("sheet unreachable: {}", e)))?;
        check_status(response).map(|_| ())
    }
}

impl RecordStore for SheetStore {
    fn name(&self) -> &str {
        "sheet"
    }

    fn append(&self, record: &ParticipantRecord) -> Result<AppendReceipt, MindtypeError> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let header = self.get_values(&format!("{}!1:1", self.tab))?;
        let mut rows = Vec::with_capacity(2);
        if header.first().is_none_or(|row| row.iter().all(|c| c.is_empty())) {
            tracing::info!(tab = %self.tab, "Writing header row to empty sheet");
            rows.push(COLUMNS.iter().map(|c| (*c).to_string()).collect());
        }
        rows.push(record.to_row());

        self.append_values(rows)?;
        tracing::debug!(participant = %record.participant_id, "Appended row to sheet");
        Ok(AppendReceipt::Stored {
            backend: self.name().to_string(),
        })
    }

    fn count(&self) -> Result<usize, MindtypeError> {
        let rows = self.get_values(&self.tab)?;
        Ok(rows.len().saturating_sub(1))
    }

    fn export(&self) -> Result<Vec<u8>, MindtypeError> {
        let rows = self.get_values(&self.tab)?;
        export_rows(rows.get(1..).unwrap_or_default())
    }
}

// =============================================================================
// RESPONSE HANDLING
// =============================================================================

fn check_status(
    response: ureq::http::Response<ureq::Body>,
) -> Result<ureq::http::Response<ureq::Body>, MindtypeError> {
    let status = response.status().as_u16();
    match status {
        200..=299 => Ok(response),
        401 | 403 => Err(MindtypeError::Persistence(format!(
            "sheet rejected credentials ({})",
            status
        ))),
        429 => Err(MindtypeError::Persistence(
            "sheet rate limited (429)".to_string(),
        )),
        _ => {
            let body = response
                .into_body()
                .read_to_string()
                .unwrap_or_default();
            Err(MindtypeError::Persistence(format!(
                "sheet error ({}): {}",
                status,
                body.chars().take(200).collect::<String>()
            )))
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(
    response: ureq::http::Response<ureq::Body>,
) -> Result<T, MindtypeError> {
    check_status(response)?
        .into_body()
        .read_json()
        .map_err(|e| MindtypeError::Serialization(format!("sheet response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::StatusCode,
        routing::get,
    };
    use mindtype_core::{Gender, ParticipantId, Severity, TaskMetrics, YearOfStudy};
    use std::sync::Arc;

    /// In-memory worksheet served over the values API routes.
    #[derive(Default)]
    struct FakeSheet {
        rows: Vec<Vec<String>>,
        appends: Vec<Vec<Vec<String>>>,
    }

    type SharedSheet = Arc<Mutex<FakeSheet>>;

    async fn read_range(
        State(sheet): State<SharedSheet>,
        Path((_id, range)): Path<(String, String)>,
    ) -> Json<ValueRange> {
        let sheet = sheet.lock().expect("lock");
        let values = if range.ends_with("!1:1") {
            sheet.rows.iter().take(1).cloned().collect()
        } else {
            sheet.rows.clone()
        };
        Json(ValueRange { values })
    }

    async fn append_range(
        State(sheet): State<SharedSheet>,
        Path((_id, range)): Path<(String, String)>,
        Json(body): Json<ValueRange>,
    ) -> StatusCode {
        if !range.ends_with(":append") {
            return StatusCode::NOT_FOUND;
        }
        let mut sheet = sheet.lock().expect("lock");
        sheet.rows.extend(body.values.iter().cloned());
        sheet.appends.push(body.values);
        StatusCode::OK
    }

    async fn serve_fake_sheet(sheet: SharedSheet) -> SheetStore {
        let app = Router::new()
            .route("/{id}/values/{range}", get(read_range).post(append_range))
            .with_state(sheet);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        SheetStore::new(&SheetConfig {
            id: "study".to_string(),
            token: "t".to_string(),
            tab: "Sheet1".to_string(),
            endpoint: format!("http://{}", addr),
        })
        .expect("store")
    }

    fn record(id: &str) -> ParticipantRecord {
        ParticipantRecord {
            participant_id: ParticipantId::parse(id).expect("id"),
            age: 23,
            gender: Gender::Female,
            year_of_study: YearOfStudy::Second,
            phq9_total: 4,
            phq9_severity: Severity::Minimal,
            depression_label: 0,
            phq9_items: [1, 1, 1, 1, 0, 0, 0, 0, 0],
            copy_task: TaskMetrics {
                duration_ms: 30_000,
                word_count: 4,
                char_count: 19,
                text: "The quick brown fox".to_string(),
            },
            free_writing: TaskMetrics::default(),
            collection_date: jiff::Timestamp::UNIX_EPOCH,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn header_is_written_only_to_an_empty_sheet() {
        let sheet = SharedSheet::default();
        let store = Arc::new(serve_fake_sheet(Arc::clone(&sheet)).await);

        let writer = Arc::clone(&store);
        tokio::task::spawn_blocking(move || {
            writer.append(&record("SHEET001")).expect("first append");
            writer.append(&record("SHEET002")).expect("second append");
        })
        .await
        .expect("join");

        let sheet = sheet.lock().expect("lock");
        assert_eq!(sheet.appends.len(), 2);

        let first = &sheet.appends[0];
        assert_eq!(first.len(), 2);
        assert_eq!(first[0][0], "participant_id");
        assert_eq!(first[0].len(), COLUMNS.len());
        assert_eq!(first[1][0], "SHEET001");

        let second = &sheet.appends[1];
        assert_eq!(second.len(), 1);
        assert_eq!(second[0][0], "SHEET002");
        assert_eq!(sheet.rows.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn count_and_export_skip_the_header_row() {
        let sheet = SharedSheet::default();
        let store = Arc::new(serve_fake_sheet(Arc::clone(&sheet)).await);

        let reader = Arc::clone(&store);
        let (empty, count, export) = tokio::task::spawn_blocking(move || {
            let empty = reader.count().expect("empty count");
            reader.append(&record("SHEET001")).expect("append");
            reader.append(&record("SHEET002")).expect("append");
            (
                empty,
                reader.count().expect("count"),
                reader.export().expect("export"),
            )
        })
        .await
        .expect("join");

        assert_eq!(empty, 0);
        assert_eq!(count, 2);

        let text = String::from_utf8(export).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("participant_id,"));
        assert_eq!(text.matches("participant_id").count(), 1);
        assert!(lines[1].starts_with("SHEET001,23,Female,2nd,4,Minimal,0"));
        assert!(lines[2].starts_with("SHEET002,"));
    }

    #[test]
    fn ranges_are_percent_encoded() {
        let store = SheetStore::new(&SheetConfig {
            id: "abc/123".to_string(),
            token: "t".to_string(),
            tab: "Responses 2024".to_string(),
            endpoint: "https://sheets.example/v4/spreadsheets".to_string(),
        })
        .expect("store");
        assert_eq!(
            store.values_url("Responses 2024!1:1"),
            "https://sheets.example/v4/spreadsheets/abc%2F123/values/Responses%202024%211%3A1"
        );
    }

    #[test]
    fn urls_are_built_from_config() {
        let store = SheetStore::new(&SheetConfig {
            id: "abc123".to_string(),
            token: "t".to_string(),
            tab: "Sheet1".to_string(),
            endpoint: "https://sheets.example/v4/spreadsheets/".to_string(),
        })
        .expect("store");
        assert_eq!(
            store.values_url("Sheet1"),
            "https://sheets.example/v4/spreadsheets/abc123/values/Sheet1"
        );
        assert_eq!(store.name(), "sheet");
    }

    #[test]
    fn unreachable_endpoint_is_a_persistence_error() {
        let store = SheetStore::new(&SheetConfig {
            id: "abc".to_string(),
            token: "t".to_string(),
            tab: "Sheet1".to_string(),
            endpoint: "http://127.0.0.1:9".to_string(),
        })
        .expect("store");
        let err = store.count().expect_err("nothing listens on port 9");
        assert!(matches!(err, MindtypeError::Persistence(_)));
    }
}
