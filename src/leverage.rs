//! Leverage / repetition engine
//!
//! Before pushing, TUs are grouped by normalized content (ignoring rid and
//! sid). Only one representative per group reaches a provider; its result is
//! fanned out to the other members with a quality penalty. A repetition is
//! *qualified* when it shares the representative's resource and notes, and
//! *unqualified* otherwise.

use crate::job::{JobRequest, JobResponse, Translation};
use crate::normalize::NormalizedString;
use crate::tu::TranslationUnit;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Quality penalties applied to repeated matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Penalties {
    pub qualified_penalty: u32,
    pub unqualified_penalty: u32,
}

impl Default for Penalties {
    fn default() -> Self {
        Self {
            qualified_penalty: 1,
            unqualified_penalty: 9,
        }
    }
}

impl Penalties {
    pub fn for_match(&self, qualified: bool) -> u32 {
        if qualified {
            self.qualified_penalty
        } else {
            self.unqualified_penalty
        }
    }
}

/// A repeated TU that receives its representative's translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeveragedTu {
    pub tu: TranslationUnit,
    pub qualified: bool,
    pub penalty: u32,
}

/// TUs sharing the same normalized content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepetitionGroup {
    pub representative: TranslationUnit,
    pub members: Vec<LeveragedTu>,
}

/// Same resource and same translator guidance
pub fn is_qualified(a: &TranslationUnit, rid: &str, notes: Option<&str>) -> bool {
    a.rid == rid && a.notes.as_deref() == notes
}

/// Group TUs by normalized content, in order of first appearance.
///
/// The first TU of each group is its representative. A TU whose GUID was
/// already seen is dropped.
pub fn group_repetitions(tus: Vec<TranslationUnit>, penalties: Penalties) -> Vec<RepetitionGroup> {
    let mut groups: Vec<RepetitionGroup> = Vec::new();
    let mut by_content: HashMap<NormalizedString, usize> = HashMap::new();
    let mut seen = HashSet::new();
    for tu in tus {
        if !seen.insert(tu.guid.clone()) {
            continue;
        }
        let content = tu.source();
        match by_content.get(&content) {
            Some(&idx) => {
                let group = &mut groups[idx];
                let qualified = is_qualified(
                    &tu,
                    &group.representative.rid,
                    group.representative.notes.as_deref(),
                );
                group.members.push(LeveragedTu {
                    tu,
                    qualified,
                    penalty: penalties.for_match(qualified),
                });
            }
            None => {
                by_content.insert(content, groups.len());
                groups.push(RepetitionGroup {
                    representative: tu,
                    members: Vec::new(),
                });
            }
        }
    }
    groups
}

/// Fan representative translations out to their repetitions.
///
/// Returns a new response with one extra translation per leveraged member
/// whose representative was translated; members already present in the
/// response are left alone.
pub fn propagate(request: &JobRequest, response: &JobResponse) -> JobResponse {
    let mut expanded = response.clone();
    if request.leverage.is_empty() {
        return expanded;
    }
    let present: HashSet<String> = response.tus.iter().map(|t| t.guid.clone()).collect();
    for translation in &response.tus {
        let Some(members) = request.leverage.get(&translation.guid) else {
            continue;
        };
        for member in members {
            if present.contains(&member.tu.guid) {
                continue;
            }
            expanded.tus.push(Translation {
                guid: member.tu.guid.clone(),
                q: translation.q.saturating_sub(member.penalty),
                ..translation.clone()
            });
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;

    fn tu(rid: &str, sid: &str, src: &str) -> TranslationUnit {
        TranslationUnit::new(rid, sid, src.into(), None)
    }

    #[test]
    fn test_groups_by_content() {
        let tus = vec![
            tu("a.json", "ok", "OK"),
            tu("a.json", "cancel", "Cancel"),
            tu("a.json", "confirm", "OK"),
            tu("b.json", "ok", "OK"),
        ];
        let groups = group_repetitions(tus, Penalties::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].representative.sid, "ok");
        assert_eq!(groups[0].members.len(), 2);
        assert!(groups[0].members[0].qualified);
        assert_eq!(groups[0].members[0].penalty, 1);
        assert!(!groups[0].members[1].qualified);
        assert_eq!(groups[0].members[1].penalty, 9);
        assert!(groups[1].members.is_empty());
    }

    #[test]
    fn test_notes_break_qualification() {
        let mut with_notes = tu("a.json", "confirm", "OK");
        with_notes.notes = Some("dialog".to_string());
        let groups = group_repetitions(vec![tu("a.json", "ok", "OK"), with_notes], Penalties::default());
        assert!(!groups[0].members[0].qualified);
    }

    #[test]
    fn test_duplicate_guid_is_dropped() {
        let groups = group_repetitions(
            vec![tu("a.json", "ok", "OK"), tu("a.json", "ok", "OK")],
            Penalties::default(),
        );
        assert_eq!(groups.len(), 1);
        assert!(groups[0].members.is_empty());
    }

    #[test]
    fn test_propagate_applies_penalty() {
        let groups = group_repetitions(
            vec![tu("a.json", "ok", "OK"), tu("a.json", "confirm", "OK")],
            Penalties::default(),
        );
        let rep = groups[0].representative.clone();
        let member_guid = groups[0].members[0].tu.guid.clone();
        let mut leverage = BTreeMap::new();
        leverage.insert(rep.guid.clone(), groups[0].members.clone());
        let request = JobRequest {
            job_guid: "j".to_string(),
            source_lang: "en".to_string(),
            target_lang: "it".to_string(),
            translation_provider: "p".to_string(),
            tus: vec![rep.clone()],
            instructions: None,
            driver: None,
            leverage,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let response = JobResponse::done(
            &request,
            vec![Translation::new(&rep.guid, "Va bene".into(), 80)],
        );
        let expanded = propagate(&request, &response);
        assert_eq!(expanded.status, JobStatus::Done);
        assert_eq!(expanded.tus.len(), 2);
        let member = expanded.translation(&member_guid).unwrap();
        assert_eq!(member.q, 79);
        assert_eq!(member.tgt.as_deref(), Some("Va bene"));

        // Propagating twice does not duplicate members
        assert_eq!(propagate(&request, &expanded).tus.len(), 2);
    }
}
