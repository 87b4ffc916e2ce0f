//! Orchestration of snapshots, jobs and the translation memory
//!
//! # Overview
//!
//! The [`Manager`] is the only component that talks to every other one. It
//! takes snapshots of the source through the configured content types, selects
//! TUs for each target language, walks the providers, persists job requests and
//! responses, and folds the responses into the per-pair TM. Target resources are
//! generated from the TM.
//!
//! Each operation loads the TMs it needs from the TM store, works on local
//! copies and saves them back, so no state outlives a call. Operations that
//! write a pair's TM hold that pair's lock from load to save, which keeps
//! concurrent calls on one manager from overwriting each other's merges.
//! Every merge is saved to the TM store before the job store records the
//! response it came from: a failed write leaves the job to be merged again,
//! never a recorded job whose translations are missing from the TM.
//!
//! # Example
//!
//! ```ignore
//! let manager = Manager::new(config);
//! let reports = manager.push(PushOptions::default()).await?;
//! for report in reports {
//!     println!("{}: {} jobs, {} unassigned", report.lang, report.jobs.len(), report.unassigned);
//! }
//! manager.translate(None, false).await?;
//! ```

pub mod report;


pub use report::{
    AnalysisReport, JobOutcome, LangStatus, PullReport, PushReport, ResourceAnnotationIssue,
    ResourceError, ResourceStatus, SegmentIssue, SnapReport, SourceSnapshot, TranslatedResource,
    TuPair, UnfinishedJob,
};

use crate::adapter::ResourceMeta;
use crate::config::{Config, ContentType, ProviderEntry};
use crate::error::{L10nError, L10nResult};
use crate::filter::ParsedResource;
use crate::job::{Driver, JobRequest, JobResponse, JobStatus};
use crate::lang::{plural_categories, plural_suffix};
use crate::leverage::{LeveragedTu, group_repetitions, propagate};
use crate::provider::ProviderContext;
use crate::store::StoredJob;
use crate::tm::{MergeReport, Rejection, TranslationMemory};
use crate::tu::TranslationUnit;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Options of [`Manager::push`]
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Restrict to one target language
    pub lang: Option<String>,
    pub driver: Driver,
    /// Send one representative per group of repeated TUs
    pub leverage: bool,
    /// Refresh done jobs instead of pushing new work
    pub refresh: bool,
    /// Walk only these providers, in this order
    pub providers: Option<Vec<String>>,
    pub instructions: Option<String>,
    /// Build requests without calling providers or persisting anything
    pub dryrun: bool,
}

/// Options of [`Manager::pull`]
#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    pub lang: Option<String>,
    /// Merge translations delivered while a job is still pending
    pub partial: bool,
}

pub struct Manager {
    config: Config,
    tm_locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

/// Whether a resource is translated into `lang`
fn resource_wants(meta: &ResourceMeta, lang: &str) -> bool {
    meta.target_langs.is_empty() || meta.target_langs.iter().any(|l| l == lang)
}

/// Pluralized TUs only go to languages that use their category
fn plural_applies(tu: &TranslationUnit, categories: &[&str]) -> bool {
    if !tu.is_suffix_pluralized {
        return true;
    }
    plural_suffix(&tu.sid).is_none_or(|suffix| categories.iter().any(|c| *c == suffix))
}

/// GUIDs a provider took care of: answered and merged, or answered and
/// already better covered by the TM
fn covered_guids(response: &JobResponse, merge: &MergeReport) -> HashSet<String> {
    let refused: HashSet<&str> = merge
        .rejected
        .iter()
        .filter(|(_, reason)| !matches!(reason, Rejection::LowerThanExisting { .. }))
        .map(|(guid, _)| guid.as_str())
        .collect();
    response
        .tus
        .iter()
        .filter(|t| !refused.contains(t.guid.as_str()))
        .map(|t| t.guid.clone())
        .collect()
}

impl Manager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tm_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn provider_context<'a>(
        &'a self,
        snapshot: &'a SourceSnapshot,
        tm: &'a TranslationMemory,
    ) -> ProviderContext<'a> {
        ProviderContext {
            context: &self.config.context,
            content_types: &self.config.content_types,
            resources: &snapshot.resources,
            tm,
        }
    }

    async fn read_resource(&self, ct: &ContentType, rid: &str) -> L10nResult<ParsedResource> {
        let raw = ct.source.fetch_resource(rid).await?;
        ct.filter.parse_resource(&raw)
    }

    /// Read and segment every source resource.
    ///
    /// A resource that can't be fetched or parsed is reported in
    /// [`SourceSnapshot::errors`] and left out; the rest of the snapshot is
    /// still usable.
    pub async fn source_snapshot(&self) -> L10nResult<SourceSnapshot> {
        let mut snapshot = SourceSnapshot {
            taken_at: self.config.context.now(),
            ..SourceSnapshot::default()
        };
        for ct in &self.config.content_types {
            let stats = ct.source.fetch_resource_stats().await?;
            debug!(content_type = %ct.name, resources = stats.len(), "Fetched resource stats");
            for mut meta in stats {
                meta.content_type = ct.name.clone();
                if snapshot.resources.contains_key(&meta.id) {
                    warn!(rid = %meta.id, content_type = %ct.name, "Resource id already used by another content type, skipping");
                    continue;
                }
                let parsed = match self.read_resource(ct, &meta.id).await {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!(rid = %meta.id, "Skipping resource: {}", e);
                        snapshot.errors.push(ResourceError {
                            rid: meta.id.clone(),
                            message: e.to_string(),
                        });
                        continue;
                    }
                };
                for issue in parsed.annotation_issues {
                    snapshot.annotation_issues.push(ResourceAnnotationIssue {
                        rid: meta.id.clone(),
                        issue,
                    });
                }
                for segment in &parsed.segments {
                    let (tu, issues) = TranslationUnit::from_segment(&meta.id, segment, &ct.decoders);
                    for issue in issues {
                        warn!(
                            rid = %meta.id,
                            sid = %segment.sid,
                            decoder = %issue.decoder,
                            snippet = %issue.snippet,
                            "Unbalanced placeholder"
                        );
                        snapshot.parse_issues.push(SegmentIssue {
                            rid: meta.id.clone(),
                            sid: segment.sid.clone(),
                            issue,
                        });
                    }
                    snapshot.tus.push(tu.with_ts(meta.modified));
                }
                snapshot.resources.insert(meta.id.clone(), meta);
            }
        }
        info!(
            resources = snapshot.resources.len(),
            tus = snapshot.tus.len(),
            errors = snapshot.errors.len(),
            "Source snapshot taken"
        );
        Ok(snapshot)
    }

    pub async fn snap(&self) -> L10nResult<SnapReport> {
        let snapshot = self.source_snapshot().await?;
        Ok(SnapReport {
            taken_at: snapshot.taken_at,
            resources: snapshot.resource_list().into_iter().cloned().collect(),
            tus: snapshot.tus,
        })
    }

    /// Target languages to work on.
    ///
    /// Configured languages win; without them the union of the resources'
    /// languages is used. Asking for a language outside that set is a
    /// configuration error.
    pub fn target_langs(&self, snapshot: &SourceSnapshot, lang: Option<&str>) -> L10nResult<Vec<String>> {
        let known: BTreeSet<String> = if self.config.target_langs.is_empty() {
            snapshot
                .resources
                .values()
                .flat_map(|meta| meta.target_langs.iter().cloned())
                .collect()
        } else {
            self.config.target_langs.iter().cloned().collect()
        };
        match lang {
            None => Ok(known.into_iter().collect()),
            Some(lang) if known.contains(lang) => Ok(vec![lang.to_string()]),
            Some(lang) => Err(L10nError::Configuration(format!(
                "Unknown target language '{}' (known: {})",
                lang,
                known.into_iter().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// Providers to walk, in order
    fn selected_providers(&self, names: Option<&[String]>) -> L10nResult<Vec<&ProviderEntry>> {
        let Some(names) = names else {
            return Ok(self.config.providers.iter().collect());
        };
        names
            .iter()
            .map(|name| {
                self.config.provider(name).ok_or_else(|| {
                    L10nError::Configuration(format!("Unknown provider '{}'", name))
                })
            })
            .collect()
    }

    /// GUIDs of every TU sitting in a pending job of the pair
    async fn in_flight_guids(&self, lang: &str) -> L10nResult<HashSet<String>> {
        let store = &self.config.job_store;
        let mut guids = HashSet::new();
        for (job_guid, handle) in store
            .get_job_status_by_lang_pair(&self.config.source_lang, lang)
            .await?
        {
            if handle.status != JobStatus::Pending {
                continue;
            }
            let request = store.get_job_request(&job_guid).await?;
            guids.extend(request.all_tus().map(|tu| tu.guid.clone()));
        }
        Ok(guids)
    }

    async fn select_tus(
        &self,
        snapshot: &SourceSnapshot,
        tm: &TranslationMemory,
        lang: &str,
        driver: &Driver,
    ) -> L10nResult<Vec<TranslationUnit>> {
        let categories = plural_categories(lang);
        let in_scope = |tu: &TranslationUnit| {
            snapshot
                .resources
                .get(&tu.rid)
                .is_some_and(|meta| resource_wants(meta, lang))
                && plural_applies(tu, &categories)
        };
        let min_quality = self.config.min_quality;

        let selected: Vec<TranslationUnit> = match driver {
            Driver::Untranslated => {
                let in_flight = self.in_flight_guids(lang).await?;
                snapshot
                    .tus
                    .iter()
                    .filter(|tu| {
                        in_scope(tu)
                            && !tm.is_translated(&tu.guid, min_quality)
                            && !in_flight.contains(&tu.guid)
                    })
                    .cloned()
                    .collect()
            }
            Driver::Source => snapshot.tus.iter().filter(|tu| in_scope(tu)).cloned().collect(),
            Driver::Tm => tm
                .tus()
                .into_iter()
                .filter(|tu| plural_applies(tu, &categories))
                .collect(),
            Driver::Job(job_guid) => {
                let request = self.config.job_store.get_job_request(job_guid).await?;
                if request.target_lang != lang {
                    return Ok(Vec::new());
                }
                request
                    .all_tus()
                    .filter(|tu| plural_applies(tu, &categories))
                    .cloned()
                    .collect()
            }
        };
        debug!(lang = %lang, driver = %driver, selected = selected.len(), "Selected TUs");
        Ok(selected)
    }

    async fn store_job(&self, request: &JobRequest, response: &JobResponse) -> L10nResult<()> {
        self.config.job_store.create_job_request(request).await?;
        self.config.job_store.append_job_response(response).await
    }

    /// Exclusive access to a pair's TM until the guard drops
    async fn lock_tm(&self, source_lang: &str, target_lang: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.tm_locks.lock().await;
            locks
                .entry((source_lang.to_string(), target_lang.to_string()))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    /// A job GUID the job store doesn't know yet.
    ///
    /// Regression GUIDs restart from the same counter in every process, so
    /// the ones taken by earlier runs over the same store are skipped.
    async fn new_job_guid(&self, seed: &str) -> L10nResult<String> {
        let ctx = &self.config.context;
        loop {
            let guid = ctx.new_job_guid(seed);
            if !ctx.is_regression() {
                return Ok(guid);
            }
            match self.config.job_store.get_job_request(&guid).await {
                Err(L10nError::JobNotFound(_)) => return Ok(guid),
                Ok(_) => debug!(job = %guid, "Job GUID used by an earlier run"),
                Err(e) => return Err(e),
            }
        }
    }

    /// Merge a response into the TM, save the TM, then record the response
    /// (as a new job when `new_job` is set).
    async fn record(
        &self,
        tm: &mut TranslationMemory,
        request: &JobRequest,
        response: &JobResponse,
        new_job: bool,
    ) -> L10nResult<Option<MergeReport>> {
        let merge = match response.status {
            JobStatus::Blocked => None,
            JobStatus::Pending if response.tus.is_empty() => None,
            _ => Some(tm.merge(request, response, self.config.min_quality)),
        };
        if merge.is_some() {
            self.config.tm_store.save(tm).await?;
        }
        if new_job {
            self.store_job(request, response).await?;
        } else {
            self.config.job_store.append_job_response(response).await?;
        }
        Ok(merge)
    }

    /// Send new work to providers, or refresh done jobs when
    /// [`PushOptions::refresh`] is set
    pub async fn push(&self, options: PushOptions) -> L10nResult<Vec<PushReport>> {
        let snapshot = self.source_snapshot().await?;
        let langs = self.target_langs(&snapshot, options.lang.as_deref())?;
        let providers = self.selected_providers(options.providers.as_deref())?;
        let mut reports = Vec::with_capacity(langs.len());
        for lang in langs {
            let report = if options.refresh {
                self.refresh_lang(&snapshot, &lang, &providers, options.dryrun).await?
            } else {
                self.push_lang(&snapshot, &lang, &providers, &options).await?
            };
            reports.push(report);
        }
        Ok(reports)
    }

    async fn push_lang(
        &self,
        snapshot: &SourceSnapshot,
        lang: &str,
        providers: &[&ProviderEntry],
        options: &PushOptions,
    ) -> L10nResult<PushReport> {
        let ctx = &self.config.context;
        let source_lang = &self.config.source_lang;
        let _tm_guard = self.lock_tm(source_lang, lang).await;
        let mut tm = self.config.tm_store.load(source_lang, lang).await?;
        let selected = self.select_tus(snapshot, &tm, lang, &options.driver).await?;
        let mut report = PushReport {
            lang: lang.to_string(),
            ..PushReport::default()
        };

        let (mut remaining, leverage) = if options.leverage {
            let mut members: BTreeMap<String, Vec<LeveragedTu>> = BTreeMap::new();
            let mut representatives = Vec::new();
            for group in group_repetitions(selected, self.config.penalties) {
                if !group.members.is_empty() {
                    members.insert(group.representative.guid.clone(), group.members);
                }
                representatives.push(group.representative);
            }
            debug!(lang = %lang, representatives = representatives.len(), groups_with_repetitions = members.len(), "Leveraged repetitions");
            (representatives, members)
        } else {
            (selected, BTreeMap::new())
        };

        for entry in providers {
            if remaining.is_empty() {
                break;
            }
            if !entry.serves(source_lang, lang) {
                continue;
            }
            let request = JobRequest {
                job_guid: self.new_job_guid(&format!("{}|{}", entry.name(), lang)).await?,
                source_lang: source_lang.clone(),
                target_lang: lang.to_string(),
                translation_provider: entry.name().to_string(),
                tus: remaining.clone(),
                instructions: options.instructions.clone(),
                driver: Some(options.driver.to_string()),
                leverage: remaining
                    .iter()
                    .filter_map(|tu| leverage.get_key_value(&tu.guid))
                    .map(|(guid, members)| (guid.clone(), members.clone()))
                    .collect(),
                updated_at: ctx.now(),
            };
            if options.dryrun {
                // Without calling providers we can't tell what the next ones would get
                report.requests.push(request);
                remaining.clear();
                break;
            }

            let response = {
                let cx = self.provider_context(snapshot, &tm);
                match entry.provider.request_translations(&cx, &request).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(provider = %entry.name(), job = %request.job_guid, "Job blocked: {}", e);
                        JobResponse::blocked(&request, &e)
                    }
                }
            };

            if response.status == JobStatus::Done && response.tus.is_empty() {
                debug!(provider = %entry.name(), lang = %lang, "Provider translated nothing, job discarded");
                continue;
            }
            let merge = match self.record(&mut tm, &request, &response, true).await {
                Ok(merge) => merge,
                Err(e) => {
                    // Unrecorded work stays with the remaining providers
                    warn!(provider = %entry.name(), job = %request.job_guid, "Could not record job: {}", e);
                    let mut outcome = JobOutcome::new(&request, &response, None);
                    outcome.error = Some(e.to_string());
                    report.jobs.push(outcome);
                    continue;
                }
            };
            match (response.status, &merge) {
                (JobStatus::Done, Some(merge)) => {
                    let covered = covered_guids(&response, merge);
                    remaining.retain(|tu| !covered.contains(&tu.guid));
                    info!(
                        provider = %entry.name(),
                        job = %request.job_guid,
                        lang = %lang,
                        accepted = merge.accepted,
                        rejected = merge.rejected.len(),
                        "Job done"
                    );
                }
                (JobStatus::Pending, _) => {
                    info!(provider = %entry.name(), job = %request.job_guid, lang = %lang, tus = request.tus.len(), "Job pending");
                    remaining.clear();
                }
                _ => {}
            }
            report.jobs.push(JobOutcome::new(&request, &response, merge));
        }

        report.unassigned = remaining.len();
        if !options.dryrun {
            self.config.tm_store.save(&tm).await?;
        }
        Ok(report)
    }

    async fn refresh_lang(
        &self,
        snapshot: &SourceSnapshot,
        lang: &str,
        providers: &[&ProviderEntry],
        dryrun: bool,
    ) -> L10nResult<PushReport> {
        let ctx = &self.config.context;
        let source_lang = &self.config.source_lang;
        let store = &self.config.job_store;
        let _tm_guard = self.lock_tm(source_lang, lang).await;
        let mut tm = self.config.tm_store.load(source_lang, lang).await?;
        let mut report = PushReport {
            lang: lang.to_string(),
            ..PushReport::default()
        };

        for (job_guid, handle) in store.get_job_status_by_lang_pair(source_lang, lang).await? {
            if handle.status != JobStatus::Done {
                continue;
            }
            let Some(entry) = providers
                .iter()
                .find(|p| p.name() == handle.translation_provider)
            else {
                continue;
            };
            if !entry.provider.capabilities().refresh {
                continue;
            }
            let (request, previous) = match store.get_stored_job(&job_guid).await {
                Ok(StoredJob {
                    request,
                    response: Some(previous),
                }) => (request, previous),
                Ok(_) => continue,
                Err(e) => {
                    warn!(job = %job_guid, "Could not read job: {}", e);
                    continue;
                }
            };
            if dryrun {
                report.requests.push(request);
                continue;
            }

            let mut changed = {
                let cx = self.provider_context(snapshot, &tm);
                match entry.provider.refresh_translations(&cx, &request, &previous).await {
                    Ok(changed) => changed,
                    Err(e) => {
                        warn!(provider = %entry.name(), job = %job_guid, "Refresh failed: {}", e);
                        continue;
                    }
                }
            };
            // An earlier refresh may already have brought the TM up to date
            changed.tus.retain(|t| {
                tm.get(&t.guid).is_none_or(|existing| {
                    Some(&existing.ntgt) != t.target().as_ref() || existing.q != t.q
                })
            });
            if changed.tus.is_empty() {
                debug!(job = %job_guid, "Nothing changed");
                continue;
            }

            let guids: HashSet<&str> = changed.tus.iter().map(|t| t.guid.as_str()).collect();
            let refreshed = JobRequest {
                job_guid: self.new_job_guid(&format!("refresh|{}", job_guid)).await?,
                source_lang: request.source_lang.clone(),
                target_lang: request.target_lang.clone(),
                translation_provider: request.translation_provider.clone(),
                tus: request
                    .all_tus()
                    .filter(|tu| guids.contains(tu.guid.as_str()))
                    .cloned()
                    .collect(),
                instructions: request.instructions.clone(),
                driver: Some(format!("refresh:{}", job_guid)),
                leverage: BTreeMap::new(),
                updated_at: ctx.now(),
            };
            let mut response = JobResponse::done(&refreshed, changed.tus);
            response.updated_at = ctx.now();
            let merge = match self.record(&mut tm, &refreshed, &response, true).await {
                Ok(merge) => merge,
                Err(e) => {
                    warn!(job = %job_guid, refreshed = %refreshed.job_guid, "Could not record refresh: {}", e);
                    continue;
                }
            };
            info!(
                job = %job_guid,
                refreshed = %refreshed.job_guid,
                accepted = merge.as_ref().map_or(0, |m| m.accepted),
                "Job refreshed"
            );
            report.jobs.push(JobOutcome::new(&refreshed, &response, merge));
        }

        if !dryrun {
            self.config.tm_store.save(&tm).await?;
        }
        Ok(report)
    }

    /// Poll every pending job
    pub async fn pull(&self, options: PullOptions) -> L10nResult<Vec<PullReport>> {
        let source_lang = &self.config.source_lang;
        let store = &self.config.job_store;
        let mut cached_snapshot = None;
        let mut reports = Vec::new();

        for (src, lang) in store.list_lang_pairs().await? {
            if &src != source_lang || options.lang.as_ref().is_some_and(|l| l != &lang) {
                continue;
            }
            let _tm_guard = self.lock_tm(&src, &lang).await;
            let pending: Vec<(String, String)> = store
                .get_job_status_by_lang_pair(&src, &lang)
                .await?
                .into_iter()
                .filter(|(_, handle)| handle.status == JobStatus::Pending)
                .map(|(guid, handle)| (guid, handle.translation_provider))
                .collect();
            if pending.is_empty() {
                continue;
            }
            if cached_snapshot.is_none() {
                cached_snapshot = Some(self.source_snapshot().await?);
            }
            let Some(snapshot) = cached_snapshot.as_ref() else {
                continue;
            };
            let mut tm = self.config.tm_store.load(&src, &lang).await?;
            let mut report = PullReport {
                lang: lang.clone(),
                ..PullReport::default()
            };

            for (job_guid, provider_name) in pending {
                let Some(entry) = self.config.provider(&provider_name) else {
                    warn!(job = %job_guid, provider = %provider_name, "Provider of pending job is not configured");
                    report.still_pending += 1;
                    continue;
                };
                let StoredJob { request, response } = match store.get_stored_job(&job_guid).await {
                    Ok(job) => job,
                    Err(e) => {
                        warn!(job = %job_guid, "Could not read pending job: {}", e);
                        report.still_pending += 1;
                        continue;
                    }
                };
                let last = response.unwrap_or_else(|| JobResponse::pending(&request, None));
                let fetched = {
                    let cx = self.provider_context(snapshot, &tm);
                    match entry.provider.fetch_translations(&cx, &request, &last).await {
                        Ok(fetched) => fetched,
                        Err(e) => {
                            warn!(job = %job_guid, provider = %provider_name, "Fetch failed: {}", e);
                            report.still_pending += 1;
                            continue;
                        }
                    }
                };

                let delivered = match fetched.status {
                    JobStatus::Pending => {
                        options.partial && !fetched.tus.is_empty() && fetched.tus != last.tus
                    }
                    JobStatus::Done | JobStatus::Blocked => true,
                };
                if !delivered {
                    report.still_pending += 1;
                    continue;
                }
                if fetched.status == JobStatus::Blocked {
                    warn!(job = %job_guid, error = ?fetched.error, "Pending job blocked by provider");
                }
                let merge = match self.record(&mut tm, &request, &fetched, false).await {
                    Ok(merge) => merge,
                    Err(e) => {
                        // Polled again next time; merging a done job twice is a no-op
                        warn!(job = %job_guid, status = %fetched.status, "Could not record response: {}", e);
                        report.still_pending += 1;
                        continue;
                    }
                };
                let accepted = merge.as_ref().map_or(0, |m| m.accepted);
                match fetched.status {
                    JobStatus::Done => info!(job = %job_guid, accepted, "Pending job completed"),
                    JobStatus::Pending => {
                        debug!(job = %job_guid, accepted, "Partial delivery merged");
                        report.still_pending += 1;
                    }
                    JobStatus::Blocked => {}
                }
                report.jobs.push(JobOutcome::new(&request, &fetched, merge));
            }
            self.config.tm_store.save(&tm).await?;
            reports.push(report);
        }
        Ok(reports)
    }

    pub async fn job_request(&self, job_guid: &str) -> L10nResult<JobRequest> {
        self.config.job_store.get_job_request(job_guid).await
    }

    /// Latest response, `None` while a request has no response
    pub async fn job_response(&self, job_guid: &str) -> L10nResult<Option<JobResponse>> {
        // Surface JobNotFound for unknown jobs
        self.config.job_store.get_job_request(job_guid).await?;
        self.config.job_store.get_job(job_guid).await
    }

    /// Every TU of a job next to its translation, leveraged repetitions
    /// included
    pub async fn job_pairs(&self, job_guid: &str) -> L10nResult<Vec<TuPair>> {
        let StoredJob { request, response } = self.config.job_store.get_stored_job(job_guid).await?;
        let expanded = response.map(|res| propagate(&request, &res));
        Ok(request
            .all_tus()
            .map(|tu| {
                let translation = expanded.as_ref().and_then(|res| res.translation(&tu.guid));
                TuPair {
                    guid: tu.guid.clone(),
                    rid: tu.rid.clone(),
                    sid: tu.sid.clone(),
                    src: tu.raw_source(),
                    tgt: translation.and_then(|t| t.target()).map(|t| t.encode()),
                    q: translation.map(|t| t.q),
                }
            })
            .collect())
    }

    /// Resubmit a stored request as a new job to the same provider
    pub async fn job_push(&self, job_guid: &str) -> L10nResult<JobOutcome> {
        let ctx = &self.config.context;
        let original = self.config.job_store.get_job_request(job_guid).await?;
        let entry = self.config.provider(&original.translation_provider).ok_or_else(|| {
            L10nError::Configuration(format!(
                "Provider '{}' of job {} is not configured",
                original.translation_provider, job_guid
            ))
        })?;
        let request = JobRequest {
            job_guid: self.new_job_guid(&format!("resubmit|{}", job_guid)).await?,
            driver: Some(Driver::Job(job_guid.to_string()).to_string()),
            updated_at: ctx.now(),
            ..original
        };

        let snapshot = self.source_snapshot().await?;
        let _tm_guard = self
            .lock_tm(&request.source_lang, &request.target_lang)
            .await;
        let mut tm = self
            .config
            .tm_store
            .load(&request.source_lang, &request.target_lang)
            .await?;
        let response = {
            let cx = self.provider_context(&snapshot, &tm);
            match entry.provider.request_translations(&cx, &request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(provider = %entry.name(), job = %request.job_guid, "Resubmitted job blocked: {}", e);
                    JobResponse::blocked(&request, &e)
                }
            }
        };
        let merge = self.record(&mut tm, &request, &response, true).await?;
        info!(job = %job_guid, resubmitted = %request.job_guid, status = %response.status, "Job resubmitted");
        Ok(JobOutcome::new(&request, &response, merge))
    }

    /// Delete a job; what it contributed to the TM stays
    pub async fn job_delete(&self, job_guid: &str) -> L10nResult<()> {
        self.config.job_store.delete_job(job_guid).await?;
        info!(job = %job_guid, "Job deleted");
        Ok(())
    }

    /// Unfinished jobs by target language
    pub async fn jobs(&self, lang: Option<&str>) -> L10nResult<BTreeMap<String, Vec<UnfinishedJob>>> {
        let store = &self.config.job_store;
        let mut unfinished: BTreeMap<String, Vec<UnfinishedJob>> = BTreeMap::new();
        for (src, tgt) in store.list_lang_pairs().await? {
            if src != self.config.source_lang || lang.is_some_and(|l| l != tgt) {
                continue;
            }
            for (job_guid, handle) in store.get_job_status_by_lang_pair(&src, &tgt).await? {
                let job = match handle.status {
                    JobStatus::Done => continue,
                    JobStatus::Pending => match store.get_job(&job_guid).await? {
                        Some(response) => UnfinishedJob::Pending(response),
                        None => {
                            let request = store.get_job_request(&job_guid).await?;
                            UnfinishedJob::Pending(JobResponse::pending(&request, None))
                        }
                    },
                    JobStatus::Blocked => UnfinishedJob::Blocked(store.get_job_request(&job_guid).await?),
                };
                unfinished.entry(tgt.clone()).or_default().push(job);
            }
        }
        Ok(unfinished)
    }

    /// Translation progress per target language
    pub async fn status(&self, lang: Option<&str>) -> L10nResult<Vec<LangStatus>> {
        let snapshot = self.source_snapshot().await?;
        let mut statuses = Vec::new();
        for lang in self.target_langs(&snapshot, lang)? {
            let tm = self.config.tm_store.load(&self.config.source_lang, &lang).await?;
            let in_flight = self.in_flight_guids(&lang).await?;
            let categories = plural_categories(&lang);
            let mut status = LangStatus {
                lang: lang.clone(),
                ..LangStatus::default()
            };

            for (_, handle) in self
                .config
                .job_store
                .get_job_status_by_lang_pair(&self.config.source_lang, &lang)
                .await?
            {
                match handle.status {
                    JobStatus::Pending => status.pending_jobs += 1,
                    JobStatus::Blocked => status.blocked_jobs += 1,
                    JobStatus::Done => status.done_jobs += 1,
                }
            }

            for tu in &snapshot.tus {
                let wanted = snapshot
                    .resources
                    .get(&tu.rid)
                    .is_some_and(|meta| resource_wants(meta, &lang));
                if !wanted || !plural_applies(tu, &categories) {
                    continue;
                }
                let resource = status.resources.entry(tu.rid.clone()).or_default();
                resource.segments += 1;
                status.segments += 1;
                if tm.is_translated(&tu.guid, self.config.min_quality) {
                    resource.translated += 1;
                    status.translated += 1;
                } else if in_flight.contains(&tu.guid) {
                    status.in_flight += 1;
                } else {
                    status.untranslated += 1;
                }
            }
            statuses.push(status);
        }
        Ok(statuses)
    }

    /// Source problems found while taking a snapshot
    pub async fn analyze(&self) -> L10nResult<AnalysisReport> {
        let snapshot = self.source_snapshot().await?;
        Ok(AnalysisReport {
            resources: snapshot.resources.len(),
            segments: snapshot.tus.len(),
            parse_issues: snapshot.parse_issues,
            annotation_issues: snapshot.annotation_issues,
            errors: snapshot.errors,
        })
    }

    /// Generate target resources from the TM and commit them
    pub async fn translate(&self, lang: Option<&str>, dryrun: bool) -> L10nResult<Vec<TranslatedResource>> {
        let snapshot = self.source_snapshot().await?;
        let min_quality = self.config.min_quality;
        let mut outcomes = Vec::new();

        for lang in self.target_langs(&snapshot, lang)? {
            let tm = self.config.tm_store.load(&self.config.source_lang, &lang).await?;
            for meta in snapshot.resource_list() {
                if !resource_wants(meta, &lang) {
                    continue;
                }
                let Some(ct) = self.config.content_type(&meta.content_type) else {
                    continue;
                };
                let guids: HashMap<&str, &str> = snapshot
                    .tus
                    .iter()
                    .filter(|tu| tu.rid == meta.id)
                    .map(|tu| (tu.sid.as_str(), tu.guid.as_str()))
                    .collect();
                let mut outcome = TranslatedResource {
                    lang: lang.clone(),
                    rid: meta.id.clone(),
                    translated_id: ct.target.translated_resource_id(&lang, &meta.id),
                    segments: 0,
                    translated: 0,
                    committed: false,
                    error: None,
                };

                let generated = match ct.source.fetch_resource(&meta.id).await {
                    Ok(raw) => {
                        let (mut segments, mut translated) = (0, 0);
                        let result = ct.filter.translate_resource(&raw, &mut |sid: &str, _src: &str| {
                            segments += 1;
                            let guid = guids.get(sid)?;
                            let entry = tm.get(guid).filter(|e| e.q >= min_quality)?;
                            translated += 1;
                            Some(entry.ntgt.encode())
                        });
                        outcome.segments = segments;
                        outcome.translated = translated;
                        result
                    }
                    Err(e) => Err(e),
                };
                let content = match generated {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(lang = %lang, rid = %meta.id, "Couldn't generate translated resource: {}", e);
                        outcome.error = Some(e.to_string());
                        outcomes.push(outcome);
                        continue;
                    }
                };

                if !dryrun {
                    match ct.target.commit_translated_resource(&lang, &meta.id, &content).await {
                        Ok(()) => {
                            outcome.committed = true;
                            debug!(lang = %lang, rid = %meta.id, translated = outcome.translated, "Committed translated resource");
                        }
                        Err(e) => {
                            warn!(lang = %lang, rid = %meta.id, "Commit failed: {}", e);
                            outcome.error = Some(e.to_string());
                        }
                    }
                }
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }

    /// TMs of the requested or every known target language
    pub async fn tm_export(&self, lang: Option<&str>) -> L10nResult<Vec<TranslationMemory>> {
        let source_lang = &self.config.source_lang;
        let langs: BTreeSet<String> = match lang {
            Some(lang) => BTreeSet::from([lang.to_string()]),
            None => {
                let mut langs: BTreeSet<String> = self.config.target_langs.iter().cloned().collect();
                for (src, tgt) in self.config.job_store.list_lang_pairs().await? {
                    if &src == source_lang {
                        langs.insert(tgt);
                    }
                }
                langs
            }
        };
        let mut tms = Vec::with_capacity(langs.len());
        for lang in langs {
            tms.push(self.config.tm_store.load(source_lang, &lang).await?);
        }
        Ok(tms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Translation;

    fn tu(rid: &str, sid: &str, src: &str) -> TranslationUnit {
        TranslationUnit::new(rid, sid, src.into(), None)
    }

    #[test]
    fn test_plural_applies() {
        let mut few = tu("a.json", "items_few", "{{count}} items");
        few.is_suffix_pluralized = true;
        assert!(!plural_applies(&few, &["one", "other"]));
        assert!(plural_applies(&few, &["one", "few", "many", "other"]));

        // Only flagged TUs are filtered
        let plain = tu("a.json", "items_few", "x");
        assert!(plural_applies(&plain, &["one", "other"]));
    }

    #[test]
    fn test_resource_wants() {
        let meta = ResourceMeta {
            id: "a.json".to_string(),
            modified: None,
            target_langs: vec!["fr".to_string()],
            content_type: "json".to_string(),
        };
        assert!(resource_wants(&meta, "fr"));
        assert!(!resource_wants(&meta, "de"));
        let open = ResourceMeta {
            target_langs: vec![],
            ..meta
        };
        assert!(resource_wants(&open, "de"));
    }

    #[test]
    fn test_covered_guids() {
        let a = tu("a.json", "a", "A");
        let b = tu("a.json", "b", "B");
        let c = tu("a.json", "c", "C");
        let request = JobRequest {
            job_guid: "j".to_string(),
            source_lang: "en".to_string(),
            target_lang: "fr".to_string(),
            translation_provider: "p".to_string(),
            tus: vec![a.clone(), b.clone(), c.clone()],
            instructions: None,
            driver: None,
            leverage: BTreeMap::new(),
            updated_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
        };
        let response = JobResponse::done(
            &request,
            vec![
                Translation::new(&a.guid, "A".into(), 60),
                Translation::new(&b.guid, "B".into(), 10),
            ],
        );
        let merge = MergeReport {
            job_guid: "j".to_string(),
            accepted: 1,
            rejected: vec![(b.guid.clone(), Rejection::BelowQuality { q: 10, minimum: 50 })],
            already_merged: false,
        };
        let covered = covered_guids(&response, &merge);
        assert!(covered.contains(&a.guid));
        assert!(!covered.contains(&b.guid));
        assert!(!covered.contains(&c.guid));
    }
}
