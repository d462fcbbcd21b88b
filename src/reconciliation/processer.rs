//! Orchestration of pending reconciliation jobs
//!
//! One call to [`ProcesserService::process`] sweeps every currently
//! pending job to a terminal state. The sweep is meant to be invoked
//! periodically by an external scheduler; it does not wait for new jobs.

use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::reconciliation::ingest::{ingest_bank, ingest_system, DateWindow};
use crate::reconciliation::matcher::{reconcile, BankTransactions};
use crate::traits::{FileGetter, ProcesserRepository};
use crate::types::*;

/// Drives pending jobs through ingestion and reconciliation against the
/// injected repository and file storage
pub struct ProcesserService<R, F> {
    repo: Arc<R>,
    files: F,
}

/// Releases a claimed job unless a terminal state was persisted
///
/// Holding the claim in a guard means a sweep future that is dropped
/// mid-job (cancellation, a caller-side timeout) still returns the job to
/// `Pending` instead of stranding it in `Processing`.
struct ClaimGuard<R: ProcesserRepository + 'static> {
    repo: Arc<R>,
    id: Uuid,
    done: bool,
}

impl<R: ProcesserRepository + 'static> ClaimGuard<R> {
    fn new(repo: Arc<R>, id: Uuid) -> Self {
        Self {
            repo,
            id,
            done: false,
        }
    }

    /// A terminal state was persisted; the claim is spent
    fn complete(mut self) {
        self.done = true;
    }

    /// Return the job to `Pending` and disarm the guard
    async fn release(mut self) {
        self.done = true;
        release_claim(&*self.repo, self.id).await;
    }
}

impl<R: ProcesserRepository + 'static> Drop for ClaimGuard<R> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        // Dropped mid-job. Drop cannot await, so the release runs on its
        // own task; without a runtime the claim stays held and only a
        // storage-level reclaim can recover it.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let repo = Arc::clone(&self.repo);
                let id = self.id;
                handle.spawn(async move { release_claim(&*repo, id).await });
            }
            Err(_) => {
                warn!(job_id = %self.id, "claimed job dropped outside a runtime, not released");
            }
        }
    }
}

async fn release_claim<R: ProcesserRepository>(repo: &R, id: Uuid) {
    if let Err(e) = repo.release_reconciliation_job(id).await {
        error!(job_id = %id, error = %e, "failed to release claimed job");
    }
}

impl<R: ProcesserRepository + 'static, F: FileGetter> ProcesserService<R, F> {
    /// Create a new processer service
    pub fn new(repo: R, files: F) -> Self {
        Self {
            repo: Arc::new(repo),
            files,
        }
    }

    /// Process all currently pending jobs in one sweep
    ///
    /// A failure to list pending jobs is fatal; everything after that is
    /// isolated per job. A job whose processing fails is persisted as
    /// `Failed` with the error message, and a job whose terminal state
    /// cannot be persisted is released back to `Pending` for the next
    /// sweep.
    pub async fn process(&self) -> ReconResult<()> {
        let jobs = self.repo.list_pending_reconciliation_jobs().await?;
        debug!(count = jobs.len(), "fetched pending reconciliation jobs");

        for job in jobs {
            self.process_job(&job).await;
        }

        Ok(())
    }

    async fn process_job(&self, job: &ReconciliationJob) {
        match self.repo.claim_reconciliation_job(job.id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id = %job.id, "job no longer pending, skipping");
                return;
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "failed to claim job, skipping");
                return;
            }
        }

        // No await between winning the claim and arming the guard, so a
        // dropped future cannot slip through unguarded.
        let guard = ClaimGuard::new(Arc::clone(&self.repo), job.id);

        match self.run_job(job).await {
            Ok(result) => {
                debug!(
                    job_id = %job.id,
                    matched = result.total_matched,
                    unmatched = result.total_unmatched,
                    "reconciliation job finished"
                );
                match self
                    .repo
                    .save_success_reconciliation_job(job.id, &result)
                    .await
                {
                    Ok(_) => guard.complete(),
                    Err(e) => {
                        error!(job_id = %job.id, error = %e, "failed to save successful job");
                        guard.release().await;
                    }
                }
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "reconciliation job failed");
                match self
                    .repo
                    .save_failed_reconciliation_job(job.id, &e.to_string())
                    .await
                {
                    Ok(_) => guard.complete(),
                    Err(save_err) => {
                        error!(job_id = %job.id, error = %save_err, "failed to save failed job");
                        guard.release().await;
                    }
                }
            }
        }
    }

    async fn run_job(&self, job: &ReconciliationJob) -> ReconResult<ReconciliationResult> {
        let window = DateWindow::new(job.start_date, job.end_date);

        let system_file = self.files.get(&job.system_transaction_csv_path).await?;
        let system_transactions = ingest_system(&system_file, &window)?;

        let mut bank_transactions = Vec::with_capacity(job.bank_transaction_sources.len());
        for source in &job.bank_transaction_sources {
            let file = self.files.get(&source.file_path).await?;
            bank_transactions.push(BankTransactions {
                bank_name: source.bank_name.clone(),
                by_date: ingest_bank(&file, &window)?,
            });
        }

        reconcile(job, &system_transactions, bank_transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::{MemoryFileStorage, MemoryRepository};
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;

    fn job_with_bank(system_path: &str, bank_path: &str) -> ReconciliationJob {
        ReconciliationJob::new(
            system_path.to_string(),
            vec![BankTransactionSource {
                bank_name: "BCA".to_string(),
                file_path: bank_path.to_string(),
            }],
            0.0,
            "2024-01-01".parse().unwrap(),
            "2024-01-31".parse().unwrap(),
        )
    }

    fn service(
        repo: &MemoryRepository,
        files: &MemoryFileStorage,
    ) -> ProcesserService<MemoryRepository, MemoryFileStorage> {
        ProcesserService::new(repo.clone(), files.clone())
    }

    #[tokio::test]
    async fn test_process_saves_successful_job() {
        let repo = MemoryRepository::new();
        let files = MemoryFileStorage::new();
        files.store(
            "system.csv",
            "S1,1000,DEBIT,2024-01-01T10:00:00Z\nS2,500,CREDIT,2024-01-02T09:00:00Z\n",
        );
        files.store("bca.csv", "B1,-1000,2024-01-01\n");
        let job = job_with_bank("system.csv", "bca.csv");
        let id = job.id;
        repo.insert_job(job);

        service(&repo, &files).process().await.unwrap();

        let saved = repo.get_job(id).unwrap();
        assert_eq!(saved.status, JobStatus::Success);
        let result = saved.result.unwrap();
        assert_eq!(result.total_processed, 2);
        assert_eq!(result.total_matched, 1);
        assert_eq!(result.total_unmatched, 1);
        assert_eq!(result.total_discrepancy_amount, BigDecimal::from(500));
        assert_eq!(result.missing_system_transactions[0].id, "S2");
    }

    #[tokio::test]
    async fn test_malformed_system_row_fails_job() {
        let repo = MemoryRepository::new();
        let files = MemoryFileStorage::new();
        files.store("system.csv", "X,abc,DEBIT,2024-01-01T00:00:00Z\n");
        files.store("bca.csv", "B1,100,2024-01-01\n");
        let job = job_with_bank("system.csv", "bca.csv");
        let id = job.id;
        repo.insert_job(job);

        service(&repo, &files).process().await.unwrap();

        let saved = repo.get_job(id).unwrap();
        assert_eq!(saved.status, JobStatus::Failed);
        assert_eq!(
            saved.error_information.as_deref(),
            Some("malformed record at line 1: invalid amount 'abc'")
        );
        assert!(saved.result.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_fails_job() {
        let repo = MemoryRepository::new();
        let files = MemoryFileStorage::new();
        let job = job_with_bank("system.csv", "bca.csv");
        let id = job.id;
        repo.insert_job(job);

        service(&repo, &files).process().await.unwrap();

        let saved = repo.get_job(id).unwrap();
        assert_eq!(saved.status, JobStatus::Failed);
        assert!(saved
            .error_information
            .unwrap()
            .contains("file not found: system.csv"));
    }

    #[tokio::test]
    async fn test_one_failing_job_does_not_abort_the_sweep() {
        let repo = MemoryRepository::new();
        let files = MemoryFileStorage::new();
        files.store("good.csv", "S1,1000,DEBIT,2024-01-01T10:00:00Z\n");
        files.store("bca.csv", "B1,-1000,2024-01-01\n");

        let bad = job_with_bank("missing.csv", "bca.csv");
        let bad_id = bad.id;
        repo.insert_job(bad);
        let good = job_with_bank("good.csv", "bca.csv");
        let good_id = good.id;
        repo.insert_job(good);

        service(&repo, &files).process().await.unwrap();

        assert_eq!(repo.get_job(bad_id).unwrap().status, JobStatus::Failed);
        assert_eq!(repo.get_job(good_id).unwrap().status, JobStatus::Success);
    }

    #[tokio::test]
    async fn test_already_claimed_job_is_skipped() {
        let repo = MemoryRepository::new();
        let files = MemoryFileStorage::new();
        files.store("system.csv", "S1,1000,DEBIT,2024-01-01T10:00:00Z\n");
        files.store("bca.csv", "B1,-1000,2024-01-01\n");
        let mut job = job_with_bank("system.csv", "bca.csv");
        job.status = JobStatus::Processing;
        let id = job.id;
        repo.insert_job(job);

        service(&repo, &files).process().await.unwrap();

        // Still processing: nothing listed it and nothing touched it.
        assert_eq!(repo.get_job(id).unwrap().status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_terminal_jobs_are_not_reprocessed() {
        let repo = MemoryRepository::new();
        let files = MemoryFileStorage::new();
        files.store("system.csv", "S1,1000,DEBIT,2024-01-01T10:00:00Z\n");
        files.store("bca.csv", "B1,-1000,2024-01-01\n");
        let job = job_with_bank("system.csv", "bca.csv");
        let id = job.id;
        repo.insert_job(job);

        let svc = service(&repo, &files);
        svc.process().await.unwrap();
        let first = repo.get_job(id).unwrap();
        svc.process().await.unwrap();
        let second = repo.get_job(id).unwrap();

        assert_eq!(first.status, JobStatus::Success);
        assert_eq!(first.updated_at, second.updated_at);
    }

    /// Repository whose listing always fails, to exercise the fatal path
    struct FailingListRepository;

    #[async_trait]
    impl ProcesserRepository for FailingListRepository {
        async fn list_pending_reconciliation_jobs(&self) -> ReconResult<Vec<ReconciliationJob>> {
            Err(ReconError::Persistence("connection refused".to_string()))
        }

        async fn claim_reconciliation_job(&self, _id: Uuid) -> ReconResult<bool> {
            Ok(false)
        }

        async fn release_reconciliation_job(&self, _id: Uuid) -> ReconResult<()> {
            Ok(())
        }

        async fn save_success_reconciliation_job(
            &self,
            _id: Uuid,
            _result: &ReconciliationResult,
        ) -> ReconResult<ReconciliationJob> {
            unreachable!("no jobs are ever listed")
        }

        async fn save_failed_reconciliation_job(
            &self,
            _id: Uuid,
            _error_information: &str,
        ) -> ReconResult<ReconciliationJob> {
            unreachable!("no jobs are ever listed")
        }
    }

    #[tokio::test]
    async fn test_list_failure_is_fatal_to_the_sweep() {
        let svc = ProcesserService::new(FailingListRepository, MemoryFileStorage::new());

        let err = svc.process().await.unwrap_err();

        assert_eq!(err, ReconError::Persistence("connection refused".to_string()));
    }

    /// Repository wrapper that fails terminal saves, leaving the claim to
    /// be released
    #[derive(Clone)]
    struct FailingSaveRepository {
        inner: MemoryRepository,
    }

    #[async_trait]
    impl ProcesserRepository for FailingSaveRepository {
        async fn list_pending_reconciliation_jobs(&self) -> ReconResult<Vec<ReconciliationJob>> {
            self.inner.list_pending_reconciliation_jobs().await
        }

        async fn claim_reconciliation_job(&self, id: Uuid) -> ReconResult<bool> {
            self.inner.claim_reconciliation_job(id).await
        }

        async fn release_reconciliation_job(&self, id: Uuid) -> ReconResult<()> {
            self.inner.release_reconciliation_job(id).await
        }

        async fn save_success_reconciliation_job(
            &self,
            _id: Uuid,
            _result: &ReconciliationResult,
        ) -> ReconResult<ReconciliationJob> {
            Err(ReconError::Persistence("write timeout".to_string()))
        }

        async fn save_failed_reconciliation_job(
            &self,
            _id: Uuid,
            _error_information: &str,
        ) -> ReconResult<ReconciliationJob> {
            Err(ReconError::Persistence("write timeout".to_string()))
        }
    }

    /// File storage whose fetches never resolve, pinning a sweep mid-job
    struct StalledFileStorage;

    #[async_trait]
    impl FileGetter for StalledFileStorage {
        async fn get(&self, _path: &str) -> ReconResult<StoredFile> {
            std::future::pending().await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_sweep_releases_claimed_job() {
        let repo = MemoryRepository::new();
        let job = job_with_bank("system.csv", "bca.csv");
        let id = job.id;
        repo.insert_job(job);

        let svc = ProcesserService::new(repo.clone(), StalledFileStorage);
        let sweep = tokio::spawn(async move { svc.process().await });

        // Wait for the sweep to claim the job and stall on the fetch.
        while repo.get_job(id).unwrap().status != JobStatus::Processing {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        sweep.abort();
        let _ = sweep.await;

        // The release runs on its own task after the drop; give it time.
        for _ in 0..500 {
            if repo.get_job(id).unwrap().status == JobStatus::Pending {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(repo.get_job(id).unwrap().status, JobStatus::Pending);

        // Retried entirely on the next sweep.
        let pending = repo.list_pending_reconciliation_jobs().await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_terminal_save_releases_the_job() {
        let inner = MemoryRepository::new();
        let files = MemoryFileStorage::new();
        files.store("system.csv", "S1,1000,DEBIT,2024-01-01T10:00:00Z\n");
        files.store("bca.csv", "B1,-1000,2024-01-01\n");
        let job = job_with_bank("system.csv", "bca.csv");
        let id = job.id;
        inner.insert_job(job);

        let svc = ProcesserService::new(FailingSaveRepository { inner: inner.clone() }, files);
        svc.process().await.unwrap();

        // The sweep survived the save failure and the job is pending again.
        assert_eq!(inner.get_job(id).unwrap().status, JobStatus::Pending);
    }
}
