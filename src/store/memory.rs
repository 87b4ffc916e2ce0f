//! In-memory stores, used by tests and dry runs

use super::{JobStore, TmStore, handle_for};
use crate::error::{L10nError, L10nResult};
use crate::job::{JobHandle, JobRequest, JobResponse, JobStatus};
use crate::tm::TranslationMemory;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct JobEntry {
    request: Option<JobRequest>,
    response: Option<JobResponse>,
}

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<BTreeMap<String, JobEntry>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> L10nError {
        L10nError::Configuration("Job store lock poisoned".to_string())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job_request(&self, request: &JobRequest) -> L10nResult<()> {
        let mut jobs = self.jobs.write().map_err(|_| Self::poisoned())?;
        let entry = jobs.entry(request.job_guid.clone()).or_default();
        if entry.request.is_some() {
            return Err(L10nError::JobExists(request.job_guid.clone()));
        }
        entry.request = Some(request.clone());
        Ok(())
    }

    async fn append_job_response(&self, response: &JobResponse) -> L10nResult<()> {
        let mut jobs = self.jobs.write().map_err(|_| Self::poisoned())?;
        let entry = jobs
            .get_mut(&response.job_guid)
            .filter(|e| e.request.is_some())
            .ok_or_else(|| L10nError::JobNotFound(response.job_guid.clone()))?;
        if entry
            .response
            .as_ref()
            .is_some_and(|r| r.status == JobStatus::Done)
        {
            return Err(L10nError::JobAlreadyDone(response.job_guid.clone()));
        }
        entry.response = Some(response.clone());
        Ok(())
    }

    async fn get_job_request(&self, job_guid: &str) -> L10nResult<JobRequest> {
        let jobs = self.jobs.read().map_err(|_| Self::poisoned())?;
        jobs.get(job_guid)
            .and_then(|e| e.request.clone())
            .ok_or_else(|| L10nError::JobNotFound(job_guid.to_string()))
    }

    async fn get_job(&self, job_guid: &str) -> L10nResult<Option<JobResponse>> {
        let jobs = self.jobs.read().map_err(|_| Self::poisoned())?;
        match jobs.get(job_guid) {
            Some(entry) if entry.request.is_some() => Ok(entry.response.clone()),
            _ => Err(L10nError::JobNotFound(job_guid.to_string())),
        }
    }

    async fn get_job_status_by_lang_pair(
        &self,
        source_lang: &str,
        target_lang: &str,
    ) -> L10nResult<Vec<(String, JobHandle)>> {
        let jobs = self.jobs.read().map_err(|_| Self::poisoned())?;
        Ok(jobs
            .iter()
            .filter_map(|(guid, entry)| {
                let request = entry.request.as_ref()?;
                (request.source_lang == source_lang && request.target_lang == target_lang)
                    .then(|| (guid.clone(), handle_for(request, entry.response.as_ref())))
            })
            .collect())
    }

    async fn list_lang_pairs(&self) -> L10nResult<Vec<(String, String)>> {
        let jobs = self.jobs.read().map_err(|_| Self::poisoned())?;
        let pairs: BTreeSet<(String, String)> = jobs
            .values()
            .filter_map(|e| e.request.as_ref())
            .map(|r| (r.source_lang.clone(), r.target_lang.clone()))
            .collect();
        Ok(pairs.into_iter().collect())
    }

    async fn delete_job(&self, job_guid: &str) -> L10nResult<()> {
        let mut jobs = self.jobs.write().map_err(|_| Self::poisoned())?;
        jobs.remove(job_guid)
            .map(|_| ())
            .ok_or_else(|| L10nError::JobNotFound(job_guid.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryTmStore {
    tms: RwLock<HashMap<(String, String), TranslationMemory>>,
}

impl MemoryTmStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TmStore for MemoryTmStore {
    async fn load(&self, source_lang: &str, target_lang: &str) -> L10nResult<TranslationMemory> {
        let tms = self
            .tms
            .read()
            .map_err(|_| L10nError::Configuration("TM store lock poisoned".to_string()))?;
        Ok(tms
            .get(&(source_lang.to_string(), target_lang.to_string()))
            .cloned()
            .unwrap_or_else(|| TranslationMemory::new(source_lang, target_lang)))
    }

    async fn save(&self, tm: &TranslationMemory) -> L10nResult<()> {
        let mut tms = self
            .tms
            .write()
            .map_err(|_| L10nError::Configuration("TM store lock poisoned".to_string()))?;
        tms.insert(
            (tm.source_lang.clone(), tm.target_lang.clone()),
            tm.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Translation;
    use crate::tu::TranslationUnit;
    use chrono::{DateTime, Utc};

    fn request(guid: &str, target: &str) -> JobRequest {
        JobRequest {
            job_guid: guid.to_string(),
            source_lang: "en".to_string(),
            target_lang: target.to_string(),
            translation_provider: "Piggy".to_string(),
            tus: vec![TranslationUnit::new("a.json", "bye", "Goodbye".into(), None)],
            instructions: None,
            driver: None,
            leverage: BTreeMap::new(),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn test_request_is_written_once() {
        let store = MemoryJobStore::new();
        let req = request("j1", "fr");
        store.create_job_request(&req).await.unwrap();
        assert!(matches!(
            store.create_job_request(&req).await,
            Err(L10nError::JobExists(_))
        ));
        assert_eq!(store.get_job_request("j1").await.unwrap(), req);
        assert_eq!(store.get_job("j1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_done_response_is_final() {
        let store = MemoryJobStore::new();
        let req = request("j1", "fr");
        store.create_job_request(&req).await.unwrap();

        let pending = JobResponse::pending(&req, None);
        store.append_job_response(&pending).await.unwrap();
        let done = JobResponse::done(&req, vec![Translation::new(&req.tus[0].guid, "Au revoir".into(), 80)]);
        store.append_job_response(&done).await.unwrap();
        assert!(matches!(
            store.append_job_response(&done).await,
            Err(L10nError::JobAlreadyDone(_))
        ));
        assert_eq!(store.get_job("j1").await.unwrap(), Some(done));
    }

    #[tokio::test]
    async fn test_response_needs_request() {
        let store = MemoryJobStore::new();
        let orphan = JobResponse::pending(&request("ghost", "fr"), None);
        assert!(matches!(
            store.append_job_response(&orphan).await,
            Err(L10nError::JobNotFound(_))
        ));
        assert!(matches!(store.get_job("ghost").await, Err(L10nError::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_status_by_pair_and_delete() {
        let store = MemoryJobStore::new();
        let fr = request("j1", "fr");
        let de = request("j2", "de");
        store.create_job_request(&fr).await.unwrap();
        store.create_job_request(&de).await.unwrap();
        store
            .append_job_response(&JobResponse::blocked(&de, "quota"))
            .await
            .unwrap();

        let statuses = store.get_job_status_by_lang_pair("en", "de").await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].0, "j2");
        assert_eq!(statuses[0].1.status, JobStatus::Blocked);
        assert_eq!(
            store.list_lang_pairs().await.unwrap(),
            vec![
                ("en".to_string(), "de".to_string()),
                ("en".to_string(), "fr".to_string())
            ]
        );

        store.delete_job("j2").await.unwrap();
        assert!(store.get_job_status_by_lang_pair("en", "de").await.unwrap().is_empty());
        assert!(store.delete_job("j2").await.is_err());
    }

    #[tokio::test]
    async fn test_tm_store_defaults_to_empty() {
        let store = MemoryTmStore::new();
        let tm = store.load("en", "fr").await.unwrap();
        assert!(tm.is_empty());
        assert_eq!(tm.target_lang, "fr");
        store.save(&tm).await.unwrap();
        assert_eq!(store.load("en", "fr").await.unwrap(), tm);
    }
}
