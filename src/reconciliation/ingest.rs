//! Streaming CSV ingestion scoped to a job's date window

use chrono::{DateTime, NaiveDate, Utc};
use csv::StringRecord;
use std::collections::BTreeMap;

use crate::reconciliation::normalize::{parse_bank_record, parse_system_record};
use crate::types::*;
use crate::utils::time::{end_of_day, start_of_day};

/// Inclusive instant range covering a job's reconciliation window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateWindow {
    /// Build the window `[start_of_day(start), end_of_day(end)]`
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start: start_of_day(start_date),
            end: end_of_day(end_date),
        }
    }

    /// Whether an instant falls inside the window, bounds inclusive
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

fn records(file: &StoredFile) -> ReconResult<Vec<StringRecord>> {
    if file.buffer.is_empty() {
        return Err(ReconError::EmptyFileBuffer(file.name.clone()));
    }

    // No trimming and no flexible record lengths: a padded amount or a
    // row with a stray field is a malformed record, not a near miss.
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(file.buffer.as_slice());

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ReconError::MalformedRecord {
            line: index + 1,
            reason: e.to_string(),
        })?;
        rows.push(record);
    }

    Ok(rows)
}

/// Ingest a system ledger CSV into an ordered transaction sequence
///
/// Rows outside the window are silently dropped; the survivors preserve
/// file order, which later determines matching order.
pub fn ingest_system(file: &StoredFile, window: &DateWindow) -> ReconResult<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (index, record) in records(file)?.iter().enumerate() {
        let tx = parse_system_record(record, index + 1)?;
        if window.contains(tx.occurred_at) {
            transactions.push(tx);
        }
    }

    Ok(transactions)
}

/// Ingest a bank export CSV, grouping rows by calendar date
///
/// Within each date bucket the transactions keep file order. The buckets
/// themselves are date-ordered so that every later traversal is
/// deterministic.
pub fn ingest_bank(
    file: &StoredFile,
    window: &DateWindow,
) -> ReconResult<BTreeMap<NaiveDate, Vec<Transaction>>> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Transaction>> = BTreeMap::new();
    for (index, record) in records(file)?.iter().enumerate() {
        let tx = parse_bank_record(record, index + 1)?;
        if window.contains(tx.occurred_at) {
            by_date.entry(tx.calendar_date()).or_default().push(tx);
        }
    }

    Ok(by_date)
}
