use super::{Capabilities, ProviderContext, TranslationProvider};
use crate::error::L10nResult;
use crate::job::{JobRequest, JobResponse, JobStatus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Turns a synchronous provider into an asynchronous one
///
/// Requests are acknowledged as `pending`. A fetch delivers the wrapped
/// provider's result once the gate is open and the turnaround has elapsed
/// since the request was accepted. Until then it answers `pending`,
/// optionally with the first `partial` translations as an early delivery.
pub struct DeferredProvider<P> {
    inner: P,
    gate: Arc<AtomicBool>,
    turnaround: Duration,
    partial: Option<usize>,
}

impl<P: TranslationProvider> DeferredProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            gate: Arc::new(AtomicBool::new(true)),
            turnaround: Duration::zero(),
            partial: None,
        }
    }

    pub fn with_turnaround(mut self, turnaround: Duration) -> Self {
        self.turnaround = turnaround;
        self
    }

    /// Deliver this many translations while the job is still pending
    pub fn with_partial(mut self, count: usize) -> Self {
        self.partial = Some(count);
        self
    }

    /// Start with the gate closed; results wait for [`Self::gate`] to open
    pub fn closed(self) -> Self {
        self.gate.store(false, Ordering::SeqCst);
        self
    }

    /// Shared switch controlling delivery
    pub fn gate(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.gate)
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn requested_at(request: &JobRequest, pending: &JobResponse) -> DateTime<Utc> {
        pending
            .handle
            .as_ref()
            .and_then(|h| h.get("requestedAt"))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(request.updated_at)
    }
}

#[async_trait]
impl<P: TranslationProvider> TranslationProvider for DeferredProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ASYNC
    }

    async fn request_translations(
        &self,
        cx: &ProviderContext<'_>,
        request: &JobRequest,
    ) -> L10nResult<JobResponse> {
        let now = cx.context.now();
        let mut response = JobResponse::pending(request, Some(serde_json::json!({ "requestedAt": now })));
        response.updated_at = now;
        Ok(response)
    }

    async fn fetch_translations(
        &self,
        cx: &ProviderContext<'_>,
        request: &JobRequest,
        pending: &JobResponse,
    ) -> L10nResult<JobResponse> {
        let now = cx.context.now();
        let ready = self.gate.load(Ordering::SeqCst)
            && now - Self::requested_at(request, pending) >= self.turnaround;

        if ready {
            let mut response = self.inner.request_translations(cx, request).await?;
            response.status = JobStatus::Done;
            response.handle = pending.handle.clone();
            response.updated_at = now;
            return Ok(response);
        }

        let mut response = JobResponse::pending(request, pending.handle.clone());
        response.updated_at = now;
        if let Some(count) = self.partial {
            // An earlier poll already computed the early delivery
            let delivered = !pending.tus.is_empty() && pending.tus.len() >= count.min(request.tus.len());
            response.tus = if delivered {
                pending.tus.clone()
            } else {
                let full = self.inner.request_translations(cx, request).await?;
                full.tus.into_iter().take(count).collect()
            };
        }
        debug!(job = %request.job_guid, partial = response.tus.len(), "Job not ready yet");
        Ok(response)
    }
}
