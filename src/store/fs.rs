//! File-backed stores
//!
//! Jobs live in one directory as `<guid>-req.json` / `<guid>-res.json`; each
//! language pair's TM is a single `tm_<source>_<target>.json`.

use super::{JobStore, TmStore, handle_for};
use crate::error::{L10nError, L10nResult};
use crate::job::{JobHandle, JobRequest, JobResponse, JobStatus};
use crate::tm::TranslationMemory;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

const REQUEST_SUFFIX: &str = "-req.json";
const RESPONSE_SUFFIX: &str = "-res.json";

fn read_json<T: DeserializeOwned>(path: &Path) -> L10nResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> L10nResult<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}

/// A job GUID must be a plain file name component
fn check_job_guid(job_guid: &str) -> L10nResult<()> {
    let plain = !job_guid.is_empty()
        && !job_guid.starts_with('.')
        && !job_guid.contains(['/', '\\', ':', '\0']);
    if plain {
        Ok(())
    } else {
        Err(L10nError::InvalidJobGuid(job_guid.to_string()))
    }
}

#[derive(Debug)]
pub struct FsJobStore {
    dir: PathBuf,
    // Serializes read-check-write sequences within this process
    write_lock: Mutex<()>,
}

impl FsJobStore {
    /// Open a job store, creating its directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> L10nResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn request_path(&self, job_guid: &str) -> L10nResult<PathBuf> {
        check_job_guid(job_guid)?;
        Ok(self.dir.join(format!("{}{}", job_guid, REQUEST_SUFFIX)))
    }

    fn response_path(&self, job_guid: &str) -> L10nResult<PathBuf> {
        check_job_guid(job_guid)?;
        Ok(self.dir.join(format!("{}{}", job_guid, RESPONSE_SUFFIX)))
    }

    fn lock(&self) -> L10nResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| L10nError::Configuration("Job store lock poisoned".to_string()))
    }

    /// Every stored request, ordered by job GUID
    fn requests(&self) -> L10nResult<Vec<JobRequest>> {
        let mut guids = BTreeSet::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let guid = name.to_str().and_then(|n| n.strip_suffix(REQUEST_SUFFIX));
            if let Some(guid) = guid.filter(|g| check_job_guid(g).is_ok()) {
                guids.insert(guid.to_string());
            }
        }
        let mut requests = Vec::with_capacity(guids.len());
        for guid in guids {
            if let Some(req) = read_json(&self.request_path(&guid)?)? {
                requests.push(req);
            }
        }
        Ok(requests)
    }
}

#[async_trait]
impl JobStore for FsJobStore {
    async fn create_job_request(&self, request: &JobRequest) -> L10nResult<()> {
        let _guard = self.lock()?;
        let path = self.request_path(&request.job_guid)?;
        if path.exists() {
            return Err(L10nError::JobExists(request.job_guid.clone()));
        }
        debug!(job = %request.job_guid, path = %path.display(), "Writing job request");
        write_json(&path, request)
    }

    async fn append_job_response(&self, response: &JobResponse) -> L10nResult<()> {
        let _guard = self.lock()?;
        if !self.request_path(&response.job_guid)?.exists() {
            return Err(L10nError::JobNotFound(response.job_guid.clone()));
        }
        let path = self.response_path(&response.job_guid)?;
        let previous: Option<JobResponse> = read_json(&path)?;
        if previous.is_some_and(|p| p.status == JobStatus::Done) {
            return Err(L10nError::JobAlreadyDone(response.job_guid.clone()));
        }
        debug!(job = %response.job_guid, status = %response.status, "Writing job response");
        write_json(&path, response)
    }

    async fn get_job_request(&self, job_guid: &str) -> L10nResult<JobRequest> {
        read_json(&self.request_path(job_guid)?)?
            .ok_or_else(|| L10nError::JobNotFound(job_guid.to_string()))
    }

    async fn get_job(&self, job_guid: &str) -> L10nResult<Option<JobResponse>> {
        if !self.request_path(job_guid)?.exists() {
            return Err(L10nError::JobNotFound(job_guid.to_string()));
        }
        read_json(&self.response_path(job_guid)?)
    }

    async fn get_job_status_by_lang_pair(
        &self,
        source_lang: &str,
        target_lang: &str,
    ) -> L10nResult<Vec<(String, JobHandle)>> {
        let mut statuses = Vec::new();
        for request in self.requests()? {
            if request.source_lang != source_lang || request.target_lang != target_lang {
                continue;
            }
            let response: Option<JobResponse> = read_json(&self.response_path(&request.job_guid)?)?;
            let handle = handle_for(&request, response.as_ref());
            statuses.push((request.job_guid, handle));
        }
        Ok(statuses)
    }

    async fn list_lang_pairs(&self) -> L10nResult<Vec<(String, String)>> {
        let pairs: BTreeSet<(String, String)> = self
            .requests()?
            .into_iter()
            .map(|r| (r.source_lang, r.target_lang))
            .collect();
        Ok(pairs.into_iter().collect())
    }

    async fn delete_job(&self, job_guid: &str) -> L10nResult<()> {
        let _guard = self.lock()?;
        let request = self.request_path(job_guid)?;
        if !request.exists() {
            return Err(L10nError::JobNotFound(job_guid.to_string()));
        }
        fs::remove_file(request)?;
        let response = self.response_path(job_guid)?;
        if response.exists() {
            fs::remove_file(response)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FsTmStore {
    dir: PathBuf,
}

impl FsTmStore {
    pub fn new(dir: impl Into<PathBuf>) -> L10nResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, source_lang: &str, target_lang: &str) -> PathBuf {
        self.dir.join(format!("tm_{}_{}.json", source_lang, target_lang))
    }
}

#[async_trait]
impl TmStore for FsTmStore {
    async fn load(&self, source_lang: &str, target_lang: &str) -> L10nResult<TranslationMemory> {
        Ok(read_json(&self.path(source_lang, target_lang))?
            .unwrap_or_else(|| TranslationMemory::new(source_lang, target_lang)))
    }

    async fn save(&self, tm: &TranslationMemory) -> L10nResult<()> {
        write_json(&self.path(&tm.source_lang, &tm.target_lang), tm)
    }
}
