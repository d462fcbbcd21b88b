//! Collaborator traits for persistence and file storage

use async_trait::async_trait;
use uuid::Uuid;

use crate::types::*;

/// Persistence boundary for the job orchestrator
///
/// Implementations may persist to any durable store. The serialized
/// `ReconciliationResult` must round-trip with all fields intact,
/// including the nested map keyed by bank name.
#[async_trait]
pub trait ProcesserRepository: Send + Sync {
    /// List every job currently in `Pending` status
    async fn list_pending_reconciliation_jobs(&self) -> ReconResult<Vec<ReconciliationJob>>;

    /// Conditionally transition a job from `Pending` to `Processing`
    ///
    /// Returns `true` only for the caller that wins the claim; a job that
    /// is no longer pending yields `false`. This is what keeps two
    /// overlapping sweeps from processing the same job.
    async fn claim_reconciliation_job(&self, id: Uuid) -> ReconResult<bool>;

    /// Return a claimed job to `Pending` so a later sweep retries it
    async fn release_reconciliation_job(&self, id: Uuid) -> ReconResult<()>;

    /// Mark a job `Success` and persist its result
    async fn save_success_reconciliation_job(
        &self,
        id: Uuid,
        result: &ReconciliationResult,
    ) -> ReconResult<ReconciliationJob>;

    /// Mark a job `Failed` with a diagnostic message
    async fn save_failed_reconciliation_job(
        &self,
        id: Uuid,
        error_information: &str,
    ) -> ReconResult<ReconciliationJob>;
}

/// File storage boundary for fetching uploaded CSVs
#[async_trait]
pub trait FileGetter: Send + Sync {
    /// Fetch the raw bytes of a stored file by path
    async fn get(&self, path: &str) -> ReconResult<StoredFile>;
}
