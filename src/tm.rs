//! Translation Memory
//!
//! One TM per language pair, keyed by TU GUID. The TM is only ever mutated by
//! merging job responses; merging is a one-way fold, so deleting a job later
//! does not retract what it contributed.

use crate::job::{JobRequest, JobResponse, JobStatus};
use crate::leverage;
use crate::normalize::NormalizedString;
use crate::tu::TranslationUnit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Best known translation of one TU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmEntry {
    pub guid: String,
    pub rid: String,
    pub sid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub nsrc: NormalizedString,
    pub ntgt: NormalizedString,
    pub q: u32,
    /// Job that produced this translation
    pub job_guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
}

impl TmEntry {
    /// Rebuild the TU this entry translates
    pub fn to_tu(&self) -> TranslationUnit {
        let mut tu = TranslationUnit::new(&self.rid, &self.sid, self.nsrc.clone(), self.notes.clone());
        tu.guid = self.guid.clone();
        tu
    }
}

/// Why a translation was not merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "reason")]
pub enum Rejection {
    /// The GUID does not belong to the job request
    UnknownGuid,
    /// The entry carries no target
    NoTarget,
    /// Placeholders invented or dropped
    Incompatible,
    BelowQuality { q: u32, minimum: u32 },
    /// The TM already holds a better translation
    LowerThanExisting { q: u32, existing: u32 },
}

/// Outcome of one merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub job_guid: String,
    pub accepted: usize,
    pub rejected: Vec<(String, Rejection)>,
    /// The job had already been merged: nothing changed
    pub already_merged: bool,
}

/// Accepted translations for one language pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationMemory {
    pub source_lang: String,
    pub target_lang: String,
    entries: BTreeMap<String, TmEntry>,
    merged_jobs: BTreeSet<String>,
}

impl TranslationMemory {
    pub fn new(source_lang: &str, target_lang: &str) -> Self {
        Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            entries: BTreeMap::new(),
            merged_jobs: BTreeSet::new(),
        }
    }

    pub fn get(&self, guid: &str) -> Option<&TmEntry> {
        self.entries.get(guid)
    }

    pub fn entries(&self) -> impl Iterator<Item = &TmEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_merged(&self, job_guid: &str) -> bool {
        self.merged_jobs.contains(job_guid)
    }

    /// Whether the TU has a translation of at least `min_quality`
    pub fn is_translated(&self, guid: &str, min_quality: u32) -> bool {
        self.entries.get(guid).is_some_and(|e| e.q >= min_quality)
    }

    /// Entries whose source has exactly this normalized content
    pub fn find_by_content(&self, content: &NormalizedString) -> Vec<&TmEntry> {
        self.entries.values().filter(|e| &e.nsrc == content).collect()
    }

    /// Every TU the TM knows about
    pub fn tus(&self) -> Vec<TranslationUnit> {
        self.entries.values().map(TmEntry::to_tu).collect()
    }

    /// Merge a job response.
    ///
    /// A translation is accepted when its GUID belongs to the request
    /// (leveraged repetitions included), it is structurally compatible with
    /// the TU source, its quality reaches `min_quality` and is not lower than
    /// the entry already in the TM. Merging a `done` job twice is a no-op.
    pub fn merge(
        &mut self,
        request: &JobRequest,
        response: &JobResponse,
        min_quality: u32,
    ) -> MergeReport {
        let mut report = MergeReport {
            job_guid: response.job_guid.clone(),
            ..MergeReport::default()
        };
        if self.merged_jobs.contains(&response.job_guid) {
            report.already_merged = true;
            return report;
        }

        let expanded = leverage::propagate(request, response);
        for translation in &expanded.tus {
            let Some(tu) = request.all_tus().find(|tu| tu.guid == translation.guid) else {
                warn!(job = %response.job_guid, guid = %translation.guid, "Translation for a TU not in the job request");
                report.rejected.push((translation.guid.clone(), Rejection::UnknownGuid));
                continue;
            };
            let Some(ntgt) = translation.target() else {
                report.rejected.push((translation.guid.clone(), Rejection::NoTarget));
                continue;
            };
            let nsrc = tu.source();
            if !nsrc.is_compatible_with(&ntgt) {
                warn!(
                    job = %response.job_guid,
                    rid = %tu.rid,
                    sid = %tu.sid,
                    src = %nsrc,
                    tgt = %ntgt,
                    "Dropping translation with incompatible placeholders"
                );
                report.rejected.push((translation.guid.clone(), Rejection::Incompatible));
                continue;
            }
            if translation.q < min_quality {
                debug!(guid = %translation.guid, q = translation.q, min_quality, "Dropping low quality translation");
                report.rejected.push((
                    translation.guid.clone(),
                    Rejection::BelowQuality {
                        q: translation.q,
                        minimum: min_quality,
                    },
                ));
                continue;
            }
            if let Some(existing) = self.entries.get(&translation.guid) {
                if existing.q > translation.q {
                    report.rejected.push((
                        translation.guid.clone(),
                        Rejection::LowerThanExisting {
                            q: translation.q,
                            existing: existing.q,
                        },
                    ));
                    continue;
                }
            }
            self.entries.insert(
                translation.guid.clone(),
                TmEntry {
                    guid: translation.guid.clone(),
                    rid: tu.rid.clone(),
                    sid: tu.sid.clone(),
                    notes: tu.notes.clone(),
                    nsrc,
                    ntgt,
                    q: translation.q,
                    job_guid: response.job_guid.clone(),
                    ts: translation.ts,
                },
            );
            report.accepted += 1;
        }
        if response.status == JobStatus::Done {
            self.merged_jobs.insert(response.job_guid.clone());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Translation;
    use crate::leverage::{Penalties, group_repetitions};
    use crate::normalize::DecoderSet;

    fn request(tus: Vec<TranslationUnit>) -> JobRequest {
        JobRequest {
            job_guid: "job-1".to_string(),
            source_lang: "en".to_string(),
            target_lang: "fr".to_string(),
            translation_provider: "mt".to_string(),
            tus,
            instructions: None,
            driver: None,
            leverage: BTreeMap::new(),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn greeting() -> TranslationUnit {
        let decoders = DecoderSet::from_names(&["doubleBrace"]).unwrap();
        TranslationUnit::new("a.json", "greeting", decoders.decode("Hello {{name}}"), None)
    }

    fn target(raw: &str) -> NormalizedString {
        DecoderSet::from_names(&["doubleBrace"]).unwrap().decode(raw)
    }

    #[test]
    fn test_merge_accepts_compatible() {
        let tu = greeting();
        let req = request(vec![tu.clone()]);
        let res = JobResponse::done(&req, vec![Translation::new(&tu.guid, target("Bonjour {{name}}"), 80)]);
        let mut tm = TranslationMemory::new("en", "fr");
        let report = tm.merge(&req, &res, 50);
        assert_eq!(report.accepted, 1);
        let entry = tm.get(&tu.guid).unwrap();
        assert_eq!(entry.ntgt.encode(), "Bonjour {{name}}");
        assert_eq!(entry.job_guid, "job-1");
        assert!(tm.is_translated(&tu.guid, 50));
        assert!(!tm.is_translated(&tu.guid, 90));
    }

    #[test]
    fn test_merge_rejects_dropped_placeholder() {
        let tu = greeting();
        let req = request(vec![tu.clone()]);
        let res = JobResponse::done(&req, vec![Translation::new(&tu.guid, "Bonjour".into(), 80)]);
        let mut tm = TranslationMemory::new("en", "fr");
        let report = tm.merge(&req, &res, 50);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.rejected, vec![(tu.guid.clone(), Rejection::Incompatible)]);
        assert!(tm.get(&tu.guid).is_none());
    }

    #[test]
    fn test_merge_rejects_low_quality_and_unknown() {
        let tu = greeting();
        let req = request(vec![tu.clone()]);
        let res = JobResponse::done(
            &req,
            vec![
                Translation::new(&tu.guid, target("Salut {{name}}"), 10),
                Translation::new("stranger", "x".into(), 90),
            ],
        );
        let mut tm = TranslationMemory::new("en", "fr");
        let report = tm.merge(&req, &res, 50);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.rejected.len(), 2);
        assert!(tm.is_empty());
    }

    #[test]
    fn test_merge_twice_is_noop() {
        let tu = greeting();
        let req = request(vec![tu.clone()]);
        let res = JobResponse::done(&req, vec![Translation::new(&tu.guid, target("Bonjour {{name}}"), 80)]);
        let mut tm = TranslationMemory::new("en", "fr");
        tm.merge(&req, &res, 50);
        let once = tm.clone();
        let report = tm.merge(&req, &res, 50);
        assert!(report.already_merged);
        assert_eq!(tm, once);
    }

    #[test]
    fn test_better_translation_wins() {
        let tu = greeting();
        let mut tm = TranslationMemory::new("en", "fr");

        let good = request(vec![tu.clone()]);
        tm.merge(&good, &JobResponse::done(&good, vec![Translation::new(&tu.guid, target("Bonjour {{name}}"), 80)]), 0);

        let mut worse = request(vec![tu.clone()]);
        worse.job_guid = "job-2".to_string();
        let report = tm.merge(&worse, &JobResponse::done(&worse, vec![Translation::new(&tu.guid, target("Salut {{name}}"), 40)]), 0);
        assert_eq!(report.accepted, 0);
        assert_eq!(tm.get(&tu.guid).unwrap().ntgt.encode(), "Bonjour {{name}}");

        let mut better = request(vec![tu.clone()]);
        better.job_guid = "job-3".to_string();
        tm.merge(&better, &JobResponse::done(&better, vec![Translation::new(&tu.guid, target("Bienvenue {{name}}"), 80)]), 0);
        assert_eq!(tm.get(&tu.guid).unwrap().job_guid, "job-3");
    }

    #[test]
    fn test_partial_merge_does_not_seal_job() {
        let tu = greeting();
        let req = request(vec![tu.clone()]);
        let mut partial = JobResponse::pending(&req, None);
        partial.tus.push(Translation::new(&tu.guid, target("Bonjour {{name}}"), 80));
        let mut tm = TranslationMemory::new("en", "fr");
        assert_eq!(tm.merge(&req, &partial, 0).accepted, 1);
        assert!(!tm.has_merged("job-1"));
    }

    #[test]
    fn test_merge_expands_leverage() {
        let tus = vec![
            TranslationUnit::new("a.json", "ok", "OK".into(), None),
            TranslationUnit::new("b.json", "ok", "OK".into(), None),
        ];
        let groups = group_repetitions(tus, Penalties::default());
        let rep = groups[0].representative.clone();
        let mut req = request(vec![rep.clone()]);
        req.leverage.insert(rep.guid.clone(), groups[0].members.clone());
        let res = JobResponse::done(&req, vec![Translation::new(&rep.guid, "D'accord".into(), 60)]);
        let mut tm = TranslationMemory::new("en", "fr");
        let report = tm.merge(&req, &res, 50);
        assert_eq!(report.accepted, 2);
        let member = tm.get(&groups[0].members[0].tu.guid).unwrap();
        assert_eq!(member.q, 51);
        assert_eq!(member.rid, "b.json");
        assert_eq!(tm.find_by_content(&"OK".into()).len(), 2);
    }

    #[test]
    fn test_entry_round_trips_to_tu() {
        let tu = greeting();
        let req = request(vec![tu.clone()]);
        let res = JobResponse::done(&req, vec![Translation::new(&tu.guid, target("Bonjour {{name}}"), 80)]);
        let mut tm = TranslationMemory::new("en", "fr");
        tm.merge(&req, &res, 50);
        assert_eq!(tm.tus(), vec![tu]);
    }
}
