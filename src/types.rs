//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Direction of a normalized transaction
///
/// Bank exports carry signed amounts; normalization folds the sign into
/// this type and stores the amount as an absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Money leaving the account
    Debit,
    /// Money entering the account
    Credit,
}

/// A single normalized transaction, from either the system ledger or a
/// bank export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Source-assigned transaction identifier
    pub id: String,
    /// Absolute amount; never negative after normalization
    pub amount: BigDecimal,
    /// Debit or credit, derived from the sign for bank rows
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// When the transaction occurred; bank rows carry a date only and are
    /// pinned to midnight UTC
    #[serde(rename = "time")]
    pub occurred_at: DateTime<Utc>,
}

impl Transaction {
    /// Calendar date used for bucketing and candidate matching
    pub fn calendar_date(&self) -> NaiveDate {
        self.occurred_at.date_naive()
    }
}

/// One bank export attached to a reconciliation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransactionSource {
    /// Aggregation key for missing-transaction reporting within one job
    pub bank_name: String,
    /// Storage path of the bank's CSV export
    pub file_path: String,
}

/// Lifecycle state of a reconciliation job
///
/// Jobs are created `Pending`, claimed into `Processing` by exactly one
/// sweep, and finish in a terminal `Success` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

/// A reconciliation job: the unit of work and of persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationJob {
    /// Unique identifier for the job
    pub id: Uuid,
    /// Current lifecycle state
    pub status: JobStatus,
    /// Storage path of the system ledger CSV
    pub system_transaction_csv_path: String,
    /// Bank exports to reconcile against, in the order they were supplied
    pub bank_transaction_sources: Vec<BankTransactionSource>,
    /// Acceptable amount deviation as a fraction of the system amount,
    /// in `[0, 1]`
    pub discrepancy_threshold: f64,
    /// First calendar day of the reconciliation window (inclusive)
    pub start_date: NaiveDate,
    /// Last calendar day of the reconciliation window (inclusive)
    pub end_date: NaiveDate,
    /// Diagnostic message recorded when the job fails
    pub error_information: Option<String>,
    /// Outcome of a successful run
    pub result: Option<ReconciliationResult>,
    /// When the job was created
    pub created_at: NaiveDateTime,
    /// When the job was last updated
    pub updated_at: NaiveDateTime,
}

impl ReconciliationJob {
    /// Create a new pending job
    pub fn new(
        system_transaction_csv_path: String,
        bank_transaction_sources: Vec<BankTransactionSource>,
        discrepancy_threshold: f64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            system_transaction_csv_path,
            bank_transaction_sources,
            discrepancy_threshold,
            start_date,
            end_date,
            error_information: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Aggregated outcome of one reconciliation run
///
/// Field names in the serialized form are contractual for any consumer
/// reading persisted results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// System transactions examined, matched or not
    #[serde(rename = "total_transaction_processed")]
    pub total_processed: u64,
    /// System transactions that found a bank counterpart
    #[serde(rename = "total_transaction_matched")]
    pub total_matched: u64,
    /// System transactions with no bank counterpart
    #[serde(rename = "total_transaction_unmatched")]
    pub total_unmatched: u64,
    /// Sum of unmatched amounts on both sides
    #[serde(rename = "total_discrepancy_amount")]
    pub total_discrepancy_amount: BigDecimal,
    /// System transactions with no accepted bank counterpart, in file order
    #[serde(rename = "missing_transactions")]
    pub missing_system_transactions: Vec<Transaction>,
    /// Unconsumed bank transactions, keyed by bank name
    #[serde(rename = "missing_bank_transactions")]
    pub missing_bank_transactions: HashMap<String, Vec<Transaction>>,
}

/// Raw file bytes fetched from a storage backend
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    /// File name, used in diagnostics
    pub name: String,
    /// Raw file contents
    pub buffer: Vec<u8>,
}

/// Errors that can occur while processing a reconciliation job
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ReconError {
    #[error("file buffer of file {0} is empty")]
    EmptyFileBuffer(String),
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("invalid transaction type: {tx_type}, trx id: {id}")]
    InvalidTransactionType { tx_type: String, id: String },
    #[error("invalid discrepancy threshold: {0}")]
    InvalidThreshold(f64),
    #[error("file fetch error: {0}")]
    FileFetch(String),
    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;
