//! Data returned by manager operations
//!
//! Reports are plain serializable values; rendering is left to callers (the
//! CLI prints them as JSON).

use crate::adapter::ResourceMeta;
use crate::filter::AnnotationIssue;
use crate::job::{JobRequest, JobResponse, JobStatus};
use crate::normalize::ParseIssue;
use crate::tm::MergeReport;
use crate::tu::TranslationUnit;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A resource that could not be read or parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceError {
    pub rid: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentIssue {
    pub rid: String,
    pub sid: String,
    #[serde(flatten)]
    pub issue: ParseIssue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAnnotationIssue {
    pub rid: String,
    #[serde(flatten)]
    pub issue: AnnotationIssue,
}

/// Every TU of the source at one point in time
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    pub taken_at: DateTime<Utc>,
    pub resources: HashMap<String, ResourceMeta>,
    pub tus: Vec<TranslationUnit>,
    pub parse_issues: Vec<SegmentIssue>,
    pub annotation_issues: Vec<ResourceAnnotationIssue>,
    pub errors: Vec<ResourceError>,
}

impl SourceSnapshot {
    /// Resources ordered by id
    pub fn resource_list(&self) -> Vec<&ResourceMeta> {
        let mut list: Vec<&ResourceMeta> = self.resources.values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }
}

/// Serializable view of a snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapReport {
    pub taken_at: DateTime<Utc>,
    pub resources: Vec<ResourceMeta>,
    pub tus: Vec<TranslationUnit>,
}

/// What happened to one job during push, refresh or pull
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job_guid: String,
    pub provider: String,
    pub status: JobStatus,
    /// TUs in the request
    pub tus: usize,
    /// Translations in the response
    pub translations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn new(request: &JobRequest, response: &JobResponse, merge: Option<MergeReport>) -> Self {
        Self {
            job_guid: request.job_guid.clone(),
            provider: request.translation_provider.clone(),
            status: response.status,
            tus: request.tus.len(),
            translations: response.tus.len(),
            merge,
            error: response.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub lang: String,
    pub jobs: Vec<JobOutcome>,
    /// Selected TUs no provider took
    pub unassigned: usize,
    /// Requests that would have been sent, in dry-run mode
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<JobRequest>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    pub lang: String,
    pub jobs: Vec<JobOutcome>,
    /// Pending jobs that are still pending
    pub still_pending: usize,
}

/// An unfinished job: pending ones with their latest response, blocked
/// ones with their request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UnfinishedJob {
    Pending(JobResponse),
    Blocked(JobRequest),
}

impl UnfinishedJob {
    pub fn job_guid(&self) -> &str {
        match self {
            UnfinishedJob::Pending(res) => &res.job_guid,
            UnfinishedJob::Blocked(req) => &req.job_guid,
        }
    }
}

/// A TU of a job side by side with its translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TuPair {
    pub guid: String,
    pub rid: String,
    pub sid: String,
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tgt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    pub segments: usize,
    pub translated: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LangStatus {
    pub lang: String,
    pub segments: usize,
    pub translated: usize,
    /// Untranslated TUs sitting in pending jobs
    pub in_flight: usize,
    pub untranslated: usize,
    pub pending_jobs: usize,
    pub blocked_jobs: usize,
    pub done_jobs: usize,
    pub resources: BTreeMap<String, ResourceStatus>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub resources: usize,
    pub segments: usize,
    pub parse_issues: Vec<SegmentIssue>,
    pub annotation_issues: Vec<ResourceAnnotationIssue>,
    pub errors: Vec<ResourceError>,
}

/// One generated target resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedResource {
    pub lang: String,
    pub rid: String,
    pub translated_id: String,
    pub segments: usize,
    pub translated: usize,
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
