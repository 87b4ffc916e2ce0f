//! Source and target adapters
//!
//! Adapters move raw resource text in and out of the engine. They know
//! nothing about formats: parsing belongs to filters.

pub mod fs;
pub mod memory;

pub use fs::{FsSource, FsTarget};
pub use memory::{MemorySource, MemoryTarget};

use crate::error::L10nResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the source adapter knows about a resource without reading it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMeta {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Languages this resource must be translated into
    pub target_langs: Vec<String>,
    pub content_type: String,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch_resource_stats(&self) -> L10nResult<Vec<ResourceMeta>>;

    async fn fetch_resource(&self, rid: &str) -> L10nResult<String>;
}

#[async_trait]
pub trait TargetAdapter: Send + Sync {
    /// Identifier of the translated counterpart of `rid`
    fn translated_resource_id(&self, lang: &str, rid: &str) -> String;

    /// Fails with `FetchFailure` when the translated resource cannot be read
    async fn fetch_translated_resource(&self, lang: &str, rid: &str) -> L10nResult<String>;

    async fn commit_translated_resource(&self, lang: &str, rid: &str, content: &str) -> L10nResult<()>;
}
