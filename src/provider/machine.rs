//! Machine translation bridge
//!
//! [`MachineTranslator`] abstracts plain-text translators (an HTTP API, a
//! deterministic mock) without coupling the engine to any of them.
//! [`MachineProvider`] turns any translator into a synchronous provider:
//! placeholders are protected as `_PH{n}_` markers, every TU of the job goes
//! out in a single batch, and the markers are swapped back on return.
//!
//! # Example
//!
//! ```ignore
//! let piggy = MachineProvider::new("Piggy", MockTranslator::new(MockMode::PigLatin), 1);
//! let response = piggy.request_translations(&cx, &request).await?;
//! assert_eq!(response.status, JobStatus::Done);
//! ```

use super::{Capabilities, ProviderContext, TranslationProvider};
use crate::error::{L10nError, L10nResult};
use crate::job::{JobRequest, JobResponse, Translation};
use crate::normalize::{extract, flatten, recover_report};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Plain-text translator
///
/// All methods are async to support I/O-bound implementations.
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    /// Translate a single string
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> L10nResult<String>;

    /// Translate several strings in one call
    ///
    /// Output order and length match the input.
    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> L10nResult<Vec<String>>;

    /// Used in logs to identify which translator handled a string
    fn provider_name(&self) -> &str;
}

/// Adapts a [`MachineTranslator`] to the provider protocol
#[derive(Debug, Clone)]
pub struct MachineProvider<T> {
    name: String,
    translator: T,
    quality: u32,
}

impl<T: MachineTranslator> MachineProvider<T> {
    pub fn new(name: &str, translator: T, quality: u32) -> Self {
        Self {
            name: name.to_string(),
            translator,
            quality,
        }
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }
}

#[async_trait]
impl<T: MachineTranslator> TranslationProvider for MachineProvider<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SYNC
    }

    async fn request_translations(
        &self,
        cx: &ProviderContext<'_>,
        request: &JobRequest,
    ) -> L10nResult<JobResponse> {
        let now = cx.context.now();
        if request.tus.is_empty() {
            let mut response = JobResponse::done(request, Vec::new());
            response.updated_at = now;
            return Ok(response);
        }

        let (texts, maps): (Vec<String>, Vec<_>) =
            request.tus.iter().map(|tu| flatten(&tu.source())).unzip();
        debug!(
            provider = %self.name,
            translator = %self.translator.provider_name(),
            strings = texts.len(),
            "Sending batch"
        );
        let translated = self
            .translator
            .translate_batch(&texts, &request.source_lang, &request.target_lang)
            .await
            .map_err(|e| L10nError::provider(&self.name, e))?;
        if translated.len() != texts.len() {
            return Err(L10nError::provider(
                &self.name,
                format!("sent {} strings, received {}", texts.len(), translated.len()),
            ));
        }

        let mut translations = Vec::with_capacity(translated.len());
        for ((tu, map), flat) in request.tus.iter().zip(&maps).zip(&translated) {
            let report = recover_report(flat, map);
            if !report.all_markers_present() {
                warn!(rid = %tu.rid, sid = %tu.sid, missing = ?report.missing, "Translation lost placeholders");
                continue;
            }
            if report.reordering_detected {
                debug!(rid = %tu.rid, sid = %tu.sid, "Placeholders reordered by translator");
            }
            translations.push(Translation::new(&tu.guid, extract(flat, map), self.quality).with_ts(Some(now)));
        }
        let mut response = JobResponse::done(request, translations);
        response.updated_at = now;
        Ok(response)
    }
}
