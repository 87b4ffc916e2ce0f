//! Translation provider protocol
//!
//! A provider turns a job request into a job response. Synchronous providers
//! answer `request_translations` with a `done` response; asynchronous ones
//! answer with `pending` and deliver later through `fetch_translations`.
//! What a provider can do is declared up front in its [`Capabilities`];
//! anything else fails with `UnsupportedOperation`.

pub mod deferred;
pub mod grandfather;
pub mod machine;
pub mod mock;
pub mod repetition;

pub use deferred::DeferredProvider;
pub use grandfather::Grandfather;
pub use machine::{MachineProvider, MachineTranslator};
pub use mock::{MockMode, MockTranslator};
pub use repetition::Repetition;

use crate::adapter::ResourceMeta;
use crate::config::{ContentType, Context};
use crate::error::{L10nError, L10nResult};
use crate::job::{JobRequest, JobResponse};
use crate::tm::TranslationMemory;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

/// Operations a provider supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub request: bool,
    pub fetch: bool,
    pub refresh: bool,
}

impl Capabilities {
    /// Answers requests inline, nothing else
    pub const SYNC: Capabilities = Capabilities {
        request: true,
        fetch: false,
        refresh: false,
    };

    /// Answers requests inline and can recompute past jobs
    pub const SYNC_REFRESH: Capabilities = Capabilities {
        request: true,
        fetch: false,
        refresh: true,
    };

    /// Accepts requests and delivers on a later fetch
    pub const ASYNC: Capabilities = Capabilities {
        request: true,
        fetch: true,
        refresh: false,
    };

    pub fn is_async(&self) -> bool {
        self.fetch
    }
}

/// Everything a provider may consult while handling a job
pub struct ProviderContext<'a> {
    pub context: &'a Context,
    pub content_types: &'a [ContentType],
    /// Source resources by id
    pub resources: &'a HashMap<String, ResourceMeta>,
    /// TM of the job's language pair as of the start of the operation
    pub tm: &'a TranslationMemory,
}

impl<'a> ProviderContext<'a> {
    /// The pipeline that handles a source resource
    pub fn content_type_for(&self, rid: &str) -> Option<&'a ContentType> {
        let meta = self.resources.get(rid)?;
        self.content_types.iter().find(|ct| ct.name == meta.content_type)
    }
}

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Name the provider is configured under
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    async fn request_translations(
        &self,
        cx: &ProviderContext<'_>,
        request: &JobRequest,
    ) -> L10nResult<JobResponse>;

    /// Poll a pending job; `pending` is the last stored response
    async fn fetch_translations(
        &self,
        _cx: &ProviderContext<'_>,
        _request: &JobRequest,
        _pending: &JobResponse,
    ) -> L10nResult<JobResponse> {
        Err(L10nError::unsupported(self.name(), "fetchTranslations"))
    }

    /// Recompute a done job; returns only the entries that changed
    async fn refresh_translations(
        &self,
        _cx: &ProviderContext<'_>,
        _request: &JobRequest,
        _previous: &JobResponse,
    ) -> L10nResult<JobResponse> {
        Err(L10nError::unsupported(self.name(), "refreshTranslations"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Context;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;

    struct Echo;

    #[async_trait]
    impl TranslationProvider for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::SYNC
        }

        async fn request_translations(
            &self,
            _cx: &ProviderContext<'_>,
            request: &JobRequest,
        ) -> L10nResult<JobResponse> {
            Ok(JobResponse::done(request, vec![]))
        }
    }

    #[tokio::test]
    async fn test_default_operations_are_unsupported() {
        let context = Context::regression(".");
        let resources = HashMap::new();
        let tm = TranslationMemory::new("en", "fr");
        let cx = ProviderContext {
            context: &context,
            content_types: &[],
            resources: &resources,
            tm: &tm,
        };
        let request = JobRequest {
            job_guid: "j".to_string(),
            source_lang: "en".to_string(),
            target_lang: "fr".to_string(),
            translation_provider: "Echo".to_string(),
            tus: vec![],
            instructions: None,
            driver: None,
            leverage: BTreeMap::new(),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let done = Echo.request_translations(&cx, &request).await.unwrap();
        let err = Echo.fetch_translations(&cx, &request, &done).await.unwrap_err();
        assert!(matches!(
            err,
            L10nError::UnsupportedOperation { operation: "fetchTranslations", .. }
        ));
        assert!(Echo.refresh_translations(&cx, &request, &done).await.is_err());
        assert!(cx.content_type_for("a.json").is_none());
    }

    #[test]
    fn test_capabilities() {
        assert!(!Capabilities::SYNC.is_async());
        assert!(Capabilities::ASYNC.is_async());
        assert!(Capabilities::SYNC_REFRESH.refresh);
    }
}
