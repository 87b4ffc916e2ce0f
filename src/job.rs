//! Job model: requests, responses and their lifecycle state
//!
//! A job is one batch request/response cycle with one provider, for one
//! language pair. Jobs are created by the manager, transitioned by providers
//! and only ever appended to the job store; a `done` job is immutable.

use crate::error::L10nError;
use crate::leverage::LeveragedTu;
use crate::normalize::NormalizedString;
use crate::tu::TranslationUnit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    /// Accepted by an asynchronous provider, result not yet available
    Pending,
    /// Response available and merged
    Done,
    /// Rejected or failed terminally
    Blocked,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Done => "done",
            JobStatus::Blocked => "blocked",
        };
        write!(f, "{}", s)
    }
}

/// Which TUs a push selects
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Driver {
    /// TUs without an acceptable TM entry
    #[default]
    Untranslated,
    /// Every source TU
    Source,
    /// Every TU known to the TM
    Tm,
    /// Replay of the TUs of a prior job
    Job(String),
}

impl FromStr for Driver {
    type Err = L10nError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "untranslated" => Ok(Driver::Untranslated),
            "source" => Ok(Driver::Source),
            "tm" => Ok(Driver::Tm),
            other => match other.strip_prefix("job:") {
                Some(guid) if !guid.is_empty() => Ok(Driver::Job(guid.to_string())),
                _ => Err(L10nError::Configuration(format!(
                    "Unknown driver '{}' (expected untranslated|source|tm|job:<guid>)",
                    other
                ))),
            },
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Driver::Untranslated => write!(f, "untranslated"),
            Driver::Source => write!(f, "source"),
            Driver::Tm => write!(f, "tm"),
            Driver::Job(guid) => write!(f, "job:{}", guid),
        }
    }
}

/// A translation of one TU, keyed by the TU's GUID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntgt: Option<NormalizedString>,
    /// Quality score
    pub q: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
}

impl Translation {
    /// Stores the target raw when it has no placeholders, normalized otherwise
    pub fn new(guid: &str, target: NormalizedString, q: u32) -> Self {
        let (tgt, ntgt) = if target.has_placeholders() {
            (None, Some(target))
        } else {
            (Some(target.encode()), None)
        };
        Self {
            guid: guid.to_string(),
            tgt,
            ntgt,
            q,
            ts: None,
        }
    }

    pub fn with_ts(mut self, ts: Option<DateTime<Utc>>) -> Self {
        self.ts = ts;
        self
    }

    /// The target in normalized form, `None` when the entry carries no target
    pub fn target(&self) -> Option<NormalizedString> {
        match (&self.ntgt, &self.tgt) {
            (Some(ntgt), _) => Some(ntgt.clone()),
            (None, Some(tgt)) => Some(NormalizedString::from_raw(tgt)),
            (None, None) => None,
        }
    }
}

/// A batch of TUs sent to one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_guid: String,
    pub source_lang: String,
    pub target_lang: String,
    pub translation_provider: String,
    pub tus: Vec<TranslationUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// Representative GUID to the repeated TUs that will receive its result
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub leverage: BTreeMap<String, Vec<LeveragedTu>>,
    pub updated_at: DateTime<Utc>,
}

impl JobRequest {
    pub fn tu(&self, guid: &str) -> Option<&TranslationUnit> {
        self.tus.iter().find(|tu| tu.guid == guid)
    }

    /// Every TU covered by this job, including leveraged repetitions
    pub fn all_tus(&self) -> impl Iterator<Item = &TranslationUnit> {
        self.tus
            .iter()
            .chain(self.leverage.values().flatten().map(|l| &l.tu))
    }
}

/// The provider's answer to a job request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_guid: String,
    pub source_lang: String,
    pub target_lang: String,
    pub translation_provider: String,
    pub status: JobStatus,
    #[serde(default)]
    pub tus: Vec<Translation>,
    /// Provider-specific tracking data for asynchronous jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobResponse {
    /// An empty response mirroring the request's identity
    pub fn for_request(request: &JobRequest, status: JobStatus) -> Self {
        Self {
            job_guid: request.job_guid.clone(),
            source_lang: request.source_lang.clone(),
            target_lang: request.target_lang.clone(),
            translation_provider: request.translation_provider.clone(),
            status,
            tus: Vec::new(),
            handle: None,
            error: None,
            updated_at: request.updated_at,
        }
    }

    pub fn done(request: &JobRequest, tus: Vec<Translation>) -> Self {
        Self {
            tus,
            ..Self::for_request(request, JobStatus::Done)
        }
    }

    pub fn pending(request: &JobRequest, handle: Option<serde_json::Value>) -> Self {
        Self {
            handle,
            ..Self::for_request(request, JobStatus::Pending)
        }
    }

    pub fn blocked(request: &JobRequest, error: impl std::fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::for_request(request, JobStatus::Blocked)
        }
    }

    pub fn translation(&self, guid: &str) -> Option<&Translation> {
        self.tus.iter().find(|t| t.guid == guid)
    }
}

/// Status entry returned by job store lookups by language pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    pub status: JobStatus,
    pub translation_provider: String,
    pub updated_at: DateTime<Utc>,
}
