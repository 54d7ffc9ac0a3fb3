//! # Tabular Export
//!
//! CSV encoding shared by every storage driver.
//!
//! - `encode_header` / `encode_row` produce complete, newline-terminated
//!   lines so a driver can append a row with a single write
//! - `export_csv` renders a full table (header first)
//! - `export_checksum` is a BLAKE3 hex digest over exported bytes

use crate::MindtypeError;
use crate::record::{COLUMNS, ParticipantRecord};
use std::collections::HashSet;

fn encode_cells<I, S>(cells: I) -> Result<Vec<u8>, MindtypeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer
        .write_record(cells)
        .map_err(|e| MindtypeError::Serialization(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| MindtypeError::Serialization(e.to_string()))
}

/// The header line.
pub fn encode_header() -> Result<Vec<u8>, MindtypeError> {
    encode_cells(COLUMNS)
}

/// One record as a single CSV line.
pub fn encode_row(record: &ParticipantRecord) -> Result<Vec<u8>, MindtypeError> {
    encode_cells(record.to_row())
}

/// Header plus one line per record.
pub fn export_csv(records: &[ParticipantRecord]) -> Result<Vec<u8>, MindtypeError> {
    let rows: Vec<Vec<String>> = records.iter().map(ParticipantRecord::to_row).collect();
    export_rows(&rows)
}

/// Header plus the given pre-rendered rows.
///
/// Used by drivers that hold rows as strings rather than records.
pub fn export_rows(rows: &[Vec<String>]) -> Result<Vec<u8>, MindtypeError> {
    let mut out = encode_header()?;
    for row in rows {
        out.extend(encode_cells(row)?);
    }
    Ok(out)
}

/// Count data rows in CSV bytes that start with a header line.
pub fn count_csv_rows(data: &[u8]) -> Result<usize, MindtypeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);
    let mut count = 0usize;
    for row in reader.records() {
        row.map_err(|e| MindtypeError::Serialization(e.to_string()))?;
        count = count.saturating_add(1);
    }
    Ok(count)
}

/// First-column values (participant ids) of CSV bytes that start with a
/// header line.
pub fn participant_ids(data: &[u8]) -> Result<HashSet<String>, MindtypeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);
    let mut ids = HashSet::new();
    for row in reader.records() {
        let row = row.map_err(|e| MindtypeError::Serialization(e.to_string()))?;
        if let Some(id) = row.get(0) {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

/// BLAKE3 hex digest of exported bytes.
#[must_use]
pub fn export_checksum(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_single_crlf_line() {
        let header = encode_header().expect("header");
        let text = String::from_utf8(header).expect("utf8");
        assert!(text.starts_with("participant_id,age,gender,year_of_study,phq9_total"));
        assert!(text.ends_with("collection_date\r\n"));
        assert_eq!(text.matches("\r\n").count(), 1);
    }

    #[test]
    fn cells_with_commas_and_newlines_are_quoted() {
        let row = vec!["a,b".to_string(), "line\nbreak".to_string()];
        let data = export_rows(std::slice::from_ref(&row)).expect("export");
        let text = String::from_utf8(data).expect("utf8");
        assert!(text.contains("\"a,b\",\"line\nbreak\"\r\n"));
    }

    #[test]
    fn count_ignores_header_and_embedded_newlines() {
        let rows = vec![
            vec!["x".to_string(), "multi\nline".to_string()],
            vec!["y".to_string(), "z".to_string()],
        ];
        let data = export_rows(&rows).expect("export");
        assert_eq!(count_csv_rows(&data).expect("count"), 2);
    }

    #[test]
    fn empty_export_counts_zero() {
        let data = export_csv(&[]).expect("export");
        assert_eq!(count_csv_rows(&data).expect("count"), 0);
    }

    #[test]
    fn checksum_is_stable_hex() {
        let a = export_checksum(b"abc");
        assert_eq!(a.len(), 64);
        assert_eq!(a, export_checksum(b"abc"));
        assert_ne!(a, export_checksum(b"abd"));
    }
}
