//! Grandfathering: import translations already deployed in target resources
//!
//! Translations found in a target resource but absent from the TM are assumed
//! to be in sync with the source and are accepted at a fixed quality.

use super::{Capabilities, ProviderContext, TranslationProvider};
use crate::error::{L10nError, L10nResult};
use crate::job::{JobRequest, JobResponse, Translation};
use crate::normalize::NormalizedString;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Grandfather {
    name: String,
    quality: u32,
}

impl Grandfather {
    pub fn new(name: &str, quality: u32) -> Self {
        Self {
            name: name.to_string(),
            quality,
        }
    }

    /// Build from configuration; `quality` is mandatory
    pub fn from_params(name: &str, params: &Map<String, Value>) -> L10nResult<Self> {
        let quality = params
            .get("quality")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                L10nError::Configuration(format!(
                    "Grandfather provider '{}' requires a numeric quality",
                    name
                ))
            })?;
        let quality = u32::try_from(quality).map_err(|_| {
            L10nError::Configuration(format!("Quality {} is out of range", quality))
        })?;
        Ok(Self::new(name, quality))
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// Deployed translations of one resource by sid; `None` if unavailable
    async fn load_target(
        &self,
        cx: &ProviderContext<'_>,
        lang: &str,
        rid: &str,
    ) -> Option<HashMap<String, NormalizedString>> {
        let Some(content_type) = cx.content_type_for(rid) else {
            info!(rid = %rid, "No content type for resource, nothing to grandfather");
            return None;
        };
        let raw = match content_type.target.fetch_translated_resource(lang, rid).await {
            Ok(raw) => raw,
            Err(e) => {
                info!(lang = %lang, rid = %rid, "Couldn't fetch translated resource: {}", e);
                return None;
            }
        };
        let parsed = match content_type.filter.parse_resource(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                info!(lang = %lang, rid = %rid, "Couldn't parse translated resource: {}", e);
                return None;
            }
        };
        Some(
            parsed
                .segments
                .into_iter()
                .map(|seg| (seg.sid, content_type.decoders.decode(&seg.str)))
                .collect(),
        )
    }

    async fn grandfather(&self, cx: &ProviderContext<'_>, request: &JobRequest) -> JobResponse {
        let mut cache: HashMap<String, Option<HashMap<String, NormalizedString>>> = HashMap::new();
        let mut translations = Vec::new();
        for tu in &request.tus {
            if !cache.contains_key(&tu.rid) {
                let lookup = self.load_target(cx, &request.target_lang, &tu.rid).await;
                cache.insert(tu.rid.clone(), lookup);
            }
            let Some(previous) = cache
                .get(&tu.rid)
                .and_then(|lookup| lookup.as_ref())
                .and_then(|lookup| lookup.get(&tu.sid))
            else {
                continue;
            };
            if !tu.source().is_compatible_with(previous) {
                debug!(rid = %tu.rid, sid = %tu.sid, "Deployed translation is not compatible with source");
                continue;
            }
            let ts = cx
                .resources
                .get(&tu.rid)
                .and_then(|meta| meta.modified)
                .or(tu.ts);
            translations.push(Translation::new(&tu.guid, previous.clone(), self.quality).with_ts(ts));
        }
        info!(
            lang = %request.target_lang,
            requested = request.tus.len(),
            grandfathered = translations.len(),
            "Grandfathering"
        );
        let mut response = JobResponse::done(request, translations);
        response.updated_at = cx.context.now();
        response
    }
}

#[async_trait]
impl TranslationProvider for Grandfather {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SYNC_REFRESH
    }

    async fn request_translations(
        &self,
        cx: &ProviderContext<'_>,
        request: &JobRequest,
    ) -> L10nResult<JobResponse> {
        Ok(self.grandfather(cx, request).await)
    }

    async fn refresh_translations(
        &self,
        cx: &ProviderContext<'_>,
        request: &JobRequest,
        previous: &JobResponse,
    ) -> L10nResult<JobResponse> {
        let mut response = self.grandfather(cx, request).await;
        response.tus.retain(|t| {
            previous
                .translation(&t.guid)
                .is_none_or(|p| p.target() != t.target())
        });
        Ok(response)
    }
}
