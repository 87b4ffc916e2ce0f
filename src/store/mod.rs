//! Persistence contracts for jobs and translation memories
//!
//! Job stores are append-only: a request is written once, responses may be
//! appended while a job is pending, and a `done` response is final. TM stores
//! load and save whole per-pair memories.

pub mod fs;
pub mod memory;

pub use fs::{FsJobStore, FsTmStore};
pub use memory::{MemoryJobStore, MemoryTmStore};

use crate::error::L10nResult;
use crate::job::{JobHandle, JobRequest, JobResponse};
use crate::tm::TranslationMemory;
use async_trait::async_trait;

/// A stored job: its request and latest response, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredJob {
    pub request: JobRequest,
    pub response: Option<JobResponse>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new request; fails with `JobExists` if the GUID is taken
    async fn create_job_request(&self, request: &JobRequest) -> L10nResult<()>;

    /// Record a provider response.
    ///
    /// Fails with `JobNotFound` when no request exists and with
    /// `JobAlreadyDone` when the stored response is already `done`.
    async fn append_job_response(&self, response: &JobResponse) -> L10nResult<()>;

    async fn get_job_request(&self, job_guid: &str) -> L10nResult<JobRequest>;

    /// Latest response of a job, `None` if the job has no response yet
    async fn get_job(&self, job_guid: &str) -> L10nResult<Option<JobResponse>>;

    /// Status of every job of a language pair, ordered by job GUID
    async fn get_job_status_by_lang_pair(
        &self,
        source_lang: &str,
        target_lang: &str,
    ) -> L10nResult<Vec<(String, JobHandle)>>;

    /// Every `(source, target)` pair with at least one job
    async fn list_lang_pairs(&self) -> L10nResult<Vec<(String, String)>>;

    async fn delete_job(&self, job_guid: &str) -> L10nResult<()>;

    async fn get_stored_job(&self, job_guid: &str) -> L10nResult<StoredJob> {
        let request = self.get_job_request(job_guid).await?;
        let response = self.get_job(job_guid).await?;
        Ok(StoredJob { request, response })
    }
}

#[async_trait]
pub trait TmStore: Send + Sync {
    /// The pair's TM, empty if nothing was saved yet
    async fn load(&self, source_lang: &str, target_lang: &str) -> L10nResult<TranslationMemory>;

    async fn save(&self, tm: &TranslationMemory) -> L10nResult<()>;
}

/// Handle derived from a request and its optional response
pub(crate) fn handle_for(request: &JobRequest, response: Option<&JobResponse>) -> JobHandle {
    match response {
        Some(res) => JobHandle {
            status: res.status,
            translation_provider: res.translation_provider.clone(),
            updated_at: res.updated_at,
        },
        // A request without response is still in flight
        None => JobHandle {
            status: crate::job::JobStatus::Pending,
            translation_provider: request.translation_provider.clone(),
            updated_at: request.updated_at,
        },
    }
}
