use super::{Capabilities, ProviderContext, TranslationProvider};
use crate::error::{L10nError, L10nResult};
use crate::job::{JobRequest, JobResponse, Translation};
use crate::leverage::{Penalties, is_qualified};
use crate::tm::TmEntry;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

/// Resolves TUs from TM entries with identical normalized content
///
/// Translations come from the pair's TM only; nothing leaves the process. A
/// candidate from the same resource with the same notes is a qualified match
/// and costs `qualified_penalty`, any other costs `unqualified_penalty`.
#[derive(Debug, Clone)]
pub struct Repetition {
    name: String,
    penalties: Penalties,
}

impl Repetition {
    pub fn new(name: &str, penalties: Penalties) -> Self {
        Self {
            name: name.to_string(),
            penalties,
        }
    }

    pub fn from_params(name: &str, params: &Map<String, Value>) -> L10nResult<Self> {
        let penalty = |key: &str, default: u32| -> L10nResult<u32> {
            match params.get(key) {
                None => Ok(default),
                Some(v) => v
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        L10nError::Configuration(format!(
                            "Provider '{}': {} must be a non-negative integer",
                            name, key
                        ))
                    }),
            }
        };
        let defaults = Penalties::default();
        Ok(Self::new(
            name,
            Penalties {
                qualified_penalty: penalty("qualifiedPenalty", defaults.qualified_penalty)?,
                unqualified_penalty: penalty("unqualifiedPenalty", defaults.unqualified_penalty)?,
            },
        ))
    }
}

#[async_trait]
impl TranslationProvider for Repetition {
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
        let mut translations = Vec::new();
        for tu in &request.tus {
            let best = cx
                .tm
                .find_by_content(&tu.source())
                .into_iter()
                .filter(|entry| entry.guid != tu.guid)
                .map(|entry| {
                    let qualified = is_qualified(tu, &entry.rid, entry.notes.as_deref());
                    (entry, entry.q.saturating_sub(self.penalties.for_match(qualified)))
                })
                .fold(None, |best: Option<(&TmEntry, u32)>, candidate| match best {
                    Some(b) if b.1 >= candidate.1 => Some(b),
                    _ => Some(candidate),
                });
            if let Some((entry, q)) = best {
                debug!(rid = %tu.rid, sid = %tu.sid, from = %entry.guid, q, "Repetition match");
                translations.push(Translation::new(&tu.guid, entry.ntgt.clone(), q).with_ts(entry.ts));
            }
        }
        let mut response = JobResponse::done(request, translations);
        response.updated_at = cx.context.now();
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Context;
    use crate::tm::TranslationMemory;
    use crate::tu::TranslationUnit;
    use std::collections::{BTreeMap, HashMap};

    fn request(guid: &str, tus: Vec<TranslationUnit>) -> JobRequest {
        JobRequest {
            job_guid: guid.to_string(),
            source_lang: "en".to_string(),
            target_lang: "fr".to_string(),
            translation_provider: "Repetition".to_string(),
            tus,
            instructions: None,
            driver: None,
            leverage: BTreeMap::new(),
            updated_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
        }
    }

    fn seeded_tm() -> TranslationMemory {
        let mut tm = TranslationMemory::new("en", "fr");
        let same_file = TranslationUnit::new("a.json", "ok", "OK".into(), None);
        let other_file = TranslationUnit::new("b.json", "ok", "OK".into(), None);
        let req = request("seed", vec![same_file.clone(), other_file.clone()]);
        let res = JobResponse::done(
            &req,
            vec![
                Translation::new(&same_file.guid, "D'accord".into(), 60),
                Translation::new(&other_file.guid, "Oui".into(), 80),
            ],
        );
        tm.merge(&req, &res, 0);
        tm
    }

    async fn run(provider: &Repetition, tm: &TranslationMemory, tus: Vec<TranslationUnit>) -> JobResponse {
        let context = Context::regression(".");
        let resources = HashMap::new();
        let cx = ProviderContext {
            context: &context,
            content_types: &[],
            resources: &resources,
            tm,
        };
        provider.request_translations(&cx, &request("rep", tus)).await.unwrap()
    }

    #[tokio::test]
    async fn test_picks_best_penalized_candidate() {
        let tm = seeded_tm();
        let tu = TranslationUnit::new("a.json", "confirm", "OK".into(), None);
        let provider = Repetition::new("Repetition", Penalties::default());
        let response = run(&provider, &tm, vec![tu.clone()]).await;
        // qualified 60 - 1 = 59 loses to unqualified 80 - 9 = 71
        let t = response.translation(&tu.guid).unwrap();
        assert_eq!(t.q, 71);
        assert_eq!(t.tgt.as_deref(), Some("Oui"));
    }

    #[tokio::test]
    async fn test_penalties_change_the_winner() {
        let tm = seeded_tm();
        let tu = TranslationUnit::new("a.json", "confirm", "OK".into(), None);
        let provider = Repetition::new(
            "Repetition",
            Penalties {
                qualified_penalty: 0,
                unqualified_penalty: 30,
            },
        );
        let t = run(&provider, &tm, vec![tu.clone()]).await.tus.remove(0);
        assert_eq!(t.q, 60);
        assert_eq!(t.tgt.as_deref(), Some("D'accord"));
    }

    #[tokio::test]
    async fn test_unmatched_tus_are_left_out() {
        let tm = seeded_tm();
        let tu = TranslationUnit::new("a.json", "cancel", "Cancel".into(), None);
        let provider = Repetition::new("Repetition", Penalties::default());
        let response = run(&provider, &tm, vec![tu]).await;
        assert!(response.tus.is_empty());
    }

    #[test]
    fn test_from_params() {
        let params: Map<String, Value> =
            serde_json::from_str(r#"{"qualifiedPenalty": 2}"#).unwrap();
        let provider = Repetition::from_params("Repetition", &params).unwrap();
        assert_eq!(provider.penalties.qualified_penalty, 2);
        assert_eq!(provider.penalties.unqualified_penalty, 9);

        let bad: Map<String, Value> = serde_json::from_str(r#"{"qualifiedPenalty": -1}"#).unwrap();
        assert!(Repetition::from_params("Repetition", &bad).is_err());
    }
}
