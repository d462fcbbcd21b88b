//! # Recon Core
//!
//! A reconciliation engine that matches a ledger of system transactions
//! against one or more bank-exported transaction CSVs for a date window,
//! reporting matched, unmatched, and missing transactions together with a
//! monetary discrepancy total.
//!
//! ## Features
//!
//! - **CSV ingestion**: headerless system-ledger and bank-export formats,
//!   normalized into canonical transactions and scoped to the job's window
//! - **Threshold-tolerant matching**: first-fit, intra-date matching with
//!   an amount tolerance relative to the system transaction
//! - **Job orchestration**: a single sweep drives every pending job to a
//!   terminal `SUCCESS` or `FAILED` state, with per-job failure isolation
//! - **Storage abstraction**: trait-based repository and file storage so
//!   any durable backend can host jobs and uploaded CSVs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recon_core::{
//!     BankTransactionSource, MemoryFileStorage, MemoryRepository, ProcesserService,
//!     ReconciliationJob,
//! };
//!
//! # async fn run() -> Result<(), recon_core::ReconError> {
//! let repo = MemoryRepository::new();
//! let files = MemoryFileStorage::new();
//! files.store("uploads/system.csv", "S1,1000,DEBIT,2024-01-01T10:00:00Z\n");
//! files.store("uploads/bca.csv", "B1,-1000,2024-01-01\n");
//!
//! repo.insert_job(ReconciliationJob::new(
//!     "uploads/system.csv".to_string(),
//!     vec![BankTransactionSource {
//!         bank_name: "BCA".to_string(),
//!         file_path: "uploads/bca.csv".to_string(),
//!     }],
//!     0.1,
//!     "2024-01-01".parse().unwrap(),
//!     "2024-01-31".parse().unwrap(),
//! ));
//!
//! ProcesserService::new(repo, files).process().await?;
//! # Ok(())
//! # }
//! ```

pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
pub use utils::*;
