//! In-memory repository and file storage for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// In-memory job repository for testing and development
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    jobs: Arc<RwLock<HashMap<Uuid, ReconciliationJob>>>,
}

impl MemoryRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job
    pub fn insert_job(&self, job: ReconciliationJob) {
        self.jobs.write().unwrap().insert(job.id, job);
    }

    /// Fetch a job by id
    pub fn get_job(&self, id: Uuid) -> Option<ReconciliationJob> {
        self.jobs.read().unwrap().get(&id).cloned()
    }

    /// Clear all jobs (useful for testing)
    pub fn clear(&self) {
        self.jobs.write().unwrap().clear();
    }

    fn update_job<T>(
        &self,
        id: Uuid,
        update: impl FnOnce(&mut ReconciliationJob) -> T,
    ) -> ReconResult<T> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| ReconError::Persistence(format!("job {} not found", id)))?;
        let value = update(job);
        job.updated_at = chrono::Utc::now().naive_utc();
        Ok(value)
    }
}

#[async_trait]
impl ProcesserRepository for MemoryRepository {
    async fn list_pending_reconciliation_jobs(&self) -> ReconResult<Vec<ReconciliationJob>> {
        let jobs = self.jobs.read().unwrap();
        let mut pending: Vec<ReconciliationJob> = jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .cloned()
            .collect();
        // HashMap iteration order is arbitrary; sweep oldest jobs first.
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn claim_reconciliation_job(&self, id: Uuid) -> ReconResult<bool> {
        self.update_job(id, |job| {
            if job.status == JobStatus::Pending {
                job.status = JobStatus::Processing;
                true
            } else {
                false
            }
        })
    }

    async fn release_reconciliation_job(&self, id: Uuid) -> ReconResult<()> {
        self.update_job(id, |job| {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Pending;
            }
        })
    }

    async fn save_success_reconciliation_job(
        &self,
        id: Uuid,
        result: &ReconciliationResult,
    ) -> ReconResult<ReconciliationJob> {
        self.update_job(id, |job| {
            job.status = JobStatus::Success;
            job.result = Some(result.clone());
            job.error_information = None;
            job.clone()
        })
    }

    async fn save_failed_reconciliation_job(
        &self,
        id: Uuid,
        error_information: &str,
    ) -> ReconResult<ReconciliationJob> {
        self.update_job(id, |job| {
            job.status = JobStatus::Failed;
            job.error_information = Some(error_information.to_string());
            job.clone()
        })
    }
}

/// In-memory file storage for testing and development
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStorage {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryFileStorage {
    /// Create a new empty file storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Store file bytes under a path
    pub fn store(&self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .write()
            .unwrap()
            .insert(path.to_string(), contents.into());
    }
}

#[async_trait]
impl FileGetter for MemoryFileStorage {
    async fn get(&self, path: &str) -> ReconResult<StoredFile> {
        let files = self.files.read().unwrap();
        let buffer = files
            .get(path)
            .cloned()
            .ok_or_else(|| ReconError::FileFetch(format!("file not found: {}", path)))?;
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Ok(StoredFile { name, buffer })
    }
}
