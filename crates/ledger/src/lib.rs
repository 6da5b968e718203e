//! Append-only trade history backed by a headerless CSV file.
//!
//! Each row is `timestamp,pair,order_type,amount` with the timestamp in
//! `%Y-%m-%d %H:%M:%S`. The file handle is opened for every append and
//! released before `append` returns, on success and on failure.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;

use common::{Error, OrderType, Result, TradeRecord};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file on first use.
    pub fn append(&self, record: &TradeRecord) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| storage(&self.path, e))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer
            .write_record([
                record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                record.pair.clone(),
                record.order_type.to_string(),
                record.amount.to_string(),
            ])
            .map_err(|e| storage(&self.path, e))?;
        writer.flush().map_err(|e| storage(&self.path, e))?;

        debug!(pair = %record.pair, order_type = %record.order_type, "Trade appended to ledger");
        Ok(())
    }

    /// Every record, oldest first.
    ///
    /// An existing empty file yields an empty list. A missing file is
    /// `Error::MissingHistory`; anything unreadable or malformed is
    /// `Error::Storage`.
    pub fn read_all(&self) -> Result<Vec<TradeRecord>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::MissingHistory),
            Err(e) => return Err(storage(&self.path, e)),
        };

        let mut reader = ReaderBuilder::new().has_headers(false).from_reader(file);
        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| storage(&self.path, e))?;
            let record = parse_row(&row).map_err(|reason| {
                Error::Storage(format!(
                    "{} line {}: {reason}",
                    self.path.display(),
                    line + 1
                ))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// History as shown to the operator: no file yet means no trades.
    pub fn history(&self) -> Result<Vec<TradeRecord>> {
        match self.read_all() {
            Err(Error::MissingHistory) => Ok(Vec::new()),
            other => other,
        }
    }
}

fn parse_row(row: &StringRecord) -> std::result::Result<TradeRecord, String> {
    if row.len() != 4 {
        return Err(format!("expected 4 columns, found {}", row.len()));
    }
    let timestamp = NaiveDateTime::parse_from_str(&row[0], TIMESTAMP_FORMAT)
        .map_err(|e| format!("bad timestamp '{}': {e}", &row[0]))?;
    let order_type = row[2].parse::<OrderType>()?;
    let amount = row[3]
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad amount '{}': {e}", &row[3]))?;

    Ok(TradeRecord {
        timestamp,
        pair: row[1].to_string(),
        order_type,
        amount,
    })
}

fn storage(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Storage(format!("{}: {e}", path.display()))
}
