//! Reading records from CSV and JSON files.
//!
//! `.json` files hold an array of objects; anything else is read as CSV with
//! a header row. Header names go through [`normalize_column`], empty cells
//! become [`CellValue::Null`], and records are numbered from 1 in file order.

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::record::{CellValue, Record, normalize_column};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Format(String),
}

pub fn read_records(path: &Path, delimiter: u8) -> Result<Vec<Record>, IngestError> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let records = if is_json {
        records_from_json(&std::fs::read_to_string(path)?)?
    } else {
        records_from_csv(std::fs::File::open(path)?, delimiter)?
    };
    log::info!("{} record(s) read from {}", records.len(), path.display());
    Ok(records)
}

pub fn records_from_csv(input: impl std::io::Read, delimiter: u8) -> Result<Vec<Record>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| normalize_column(h.trim_start_matches('\u{feff}')))
        .collect();

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row?;
        let mut record = Record::new(idx + 1);
        for (header, cell) in headers.iter().zip(row.iter()) {
            if header.is_empty() {
                continue;
            }
            let value = if cell.trim().is_empty() {
                CellValue::Null
            } else {
                CellValue::from(cell)
            };
            record.insert(header, value);
        }
        records.push(record);
    }
    Ok(records)
}

pub fn records_from_json(json: &str) -> Result<Vec<Record>, IngestError> {
    let Value::Array(rows) = serde_json::from_str::<Value>(json)? else {
        return Err(IngestError::Format(
            "expected a JSON array of objects".to_string(),
        ));
    };

    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let Value::Object(fields) = row else {
                return Err(IngestError::Format(format!(
                    "row {} is not a JSON object",
                    idx + 1
                )));
            };
            let mut record = Record::new(idx + 1);
            for (key, value) in fields {
                record.insert(&key, cell_from_json(value));
            }
            Ok(record)
        })
        .collect()
}

fn cell_from_json(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Number(n) => n.as_f64().map_or(CellValue::Null, CellValue::Number),
        Value::String(s) if s.trim().is_empty() => CellValue::Null,
        Value::String(s) => CellValue::Text(s),
        other => CellValue::Text(other.to_string()),
    }
}
