//! Configuration and execution context
//!
//! A [`Config`] is built once, either programmatically through
//! [`ConfigBuilder`] or from an `l10n.json` project file, and handed to the
//! [`Manager`](crate::manager::Manager). The [`Context`] it carries replaces
//! any process-wide state: base directory, regression mode, clock and job
//! GUID generation all flow from it.

use crate::adapter::{FsSource, FsTarget, SourceAdapter, TargetAdapter};
use crate::error::{L10nError, L10nResult};
use crate::filter::ResourceFilter;
use crate::lang::validate_language;
use crate::leverage::Penalties;
use crate::normalize::DecoderSet;
use crate::provider::TranslationProvider;
use crate::registry::Registry;
use crate::store::{FsJobStore, FsTmStore, JobStore, MemoryJobStore, MemoryTmStore, TmStore};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Name of the project file looked up by [`ProjectConfig::find`]
pub const PROJECT_FILE: &str = "l10n.json";

/// Explicit execution context
///
/// In regression mode the clock is frozen at the Unix epoch and job GUIDs
/// are derived from a counter, so runs are reproducible.
#[derive(Debug)]
pub struct Context {
    base_dir: PathBuf,
    regression: bool,
    job_counter: AtomicU64,
}

impl Context {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            regression: false,
            job_counter: AtomicU64::new(0),
        }
    }

    pub fn regression(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            regression: true,
            ..Self::new(base_dir)
        }
    }

    pub fn with_regression(mut self, regression: bool) -> Self {
        self.regression = regression;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn is_regression(&self) -> bool {
        self.regression
    }

    /// Resolve a path relative to the base directory
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.base_dir.join(path)
    }

    pub fn now(&self) -> DateTime<Utc> {
        if self.regression {
            DateTime::<Utc>::UNIX_EPOCH
        } else {
            Utc::now()
        }
    }

    /// A fresh job GUID; `seed` only matters in regression mode
    pub fn new_job_guid(&self, seed: &str) -> String {
        if !self.regression {
            return uuid::Uuid::new_v4().to_string();
        }
        let n = self.job_counter.fetch_add(1, Ordering::Relaxed);
        let digest = Sha256::digest(format!("{}:{}", seed, n).as_bytes());
        let mut guid = URL_SAFE_NO_PAD.encode(digest);
        guid.truncate(22);
        guid
    }
}

/// The pipeline for one kind of resource
#[derive(Clone)]
pub struct ContentType {
    pub name: String,
    pub source: Arc<dyn SourceAdapter>,
    pub filter: Arc<dyn ResourceFilter>,
    pub decoders: DecoderSet,
    pub target: Arc<dyn TargetAdapter>,
}

impl std::fmt::Debug for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentType")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("decoders", &self.decoders.names())
            .finish_non_exhaustive()
    }
}

/// A configured provider and the language pairs it serves
#[derive(Clone)]
pub struct ProviderEntry {
    pub provider: Arc<dyn TranslationProvider>,
    /// `None` serves every pair
    pub pairs: Option<Vec<(String, String)>>,
}

impl ProviderEntry {
    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn serves(&self, source_lang: &str, target_lang: &str) -> bool {
        match &self.pairs {
            None => true,
            Some(pairs) => pairs
                .iter()
                .any(|(s, t)| s == source_lang && t == target_lang),
        }
    }
}

pub struct Config {
    pub context: Context,
    pub source_lang: String,
    /// Fixed target languages; when empty they come from the resources
    pub target_langs: Vec<String>,
    pub min_quality: u32,
    pub penalties: Penalties,
    pub content_types: Vec<ContentType>,
    /// Providers in the order a push walks them
    pub providers: Vec<ProviderEntry>,
    pub job_store: Arc<dyn JobStore>,
    pub tm_store: Arc<dyn TmStore>,
}

impl Config {
    pub fn builder(source_lang: &str) -> ConfigBuilder {
        ConfigBuilder::new(source_lang)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers.iter().find(|p| p.name() == name)
    }

    pub fn content_type(&self, name: &str) -> Option<&ContentType> {
        self.content_types.iter().find(|ct| ct.name == name)
    }
}

pub struct ConfigBuilder {
    context: Context,
    source_lang: String,
    target_langs: Vec<String>,
    min_quality: u32,
    penalties: Penalties,
    content_types: Vec<ContentType>,
    providers: Vec<ProviderEntry>,
    job_store: Option<Arc<dyn JobStore>>,
    tm_store: Option<Arc<dyn TmStore>>,
}

impl ConfigBuilder {
    pub fn new(source_lang: &str) -> Self {
        Self {
            context: Context::new("."),
            source_lang: source_lang.to_string(),
            target_langs: Vec::new(),
            min_quality: 50,
            penalties: Penalties::default(),
            content_types: Vec::new(),
            providers: Vec::new(),
            job_store: None,
            tm_store: None,
        }
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn target_langs<S: AsRef<str>>(mut self, langs: &[S]) -> Self {
        self.target_langs = langs.iter().map(|l| l.as_ref().to_string()).collect();
        self
    }

    pub fn min_quality(mut self, min_quality: u32) -> Self {
        self.min_quality = min_quality;
        self
    }

    pub fn penalties(mut self, penalties: Penalties) -> Self {
        self.penalties = penalties;
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_types.push(content_type);
        self
    }

    /// Append a provider serving every language pair
    pub fn provider(mut self, provider: Arc<dyn TranslationProvider>) -> Self {
        self.providers.push(ProviderEntry {
            provider,
            pairs: None,
        });
        self
    }

    pub fn provider_for_pairs(
        mut self,
        provider: Arc<dyn TranslationProvider>,
        pairs: Vec<(String, String)>,
    ) -> Self {
        self.providers.push(ProviderEntry {
            provider,
            pairs: Some(pairs),
        });
        self
    }

    pub fn job_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.job_store = Some(store);
        self
    }

    pub fn tm_store(mut self, store: Arc<dyn TmStore>) -> Self {
        self.tm_store = Some(store);
        self
    }

    /// Validate and assemble; stores default to in-memory ones
    pub fn build(self) -> L10nResult<Config> {
        validate_language(&self.source_lang)?;
        for lang in &self.target_langs {
            validate_language(lang)?;
        }

        let mut names = HashSet::new();
        for entry in &self.providers {
            if !names.insert(entry.name().to_string()) {
                return Err(L10nError::Configuration(format!(
                    "Duplicate provider name '{}'",
                    entry.name()
                )));
            }
            if !entry.provider.capabilities().request {
                return Err(L10nError::Configuration(format!(
                    "Provider '{}' cannot accept translation requests",
                    entry.name()
                )));
            }
            for (source, target) in entry.pairs.iter().flatten() {
                validate_language(source)?;
                validate_language(target)?;
            }
        }

        let mut content_types = HashSet::new();
        for ct in &self.content_types {
            if !content_types.insert(ct.name.as_str()) {
                return Err(L10nError::Configuration(format!(
                    "Duplicate content type '{}'",
                    ct.name
                )));
            }
        }

        Ok(Config {
            context: self.context,
            source_lang: self.source_lang,
            target_langs: self.target_langs,
            min_quality: self.min_quality,
            penalties: self.penalties,
            content_types: self.content_types,
            providers: self.providers,
            job_store: self
                .job_store
                .unwrap_or_else(|| Arc::new(MemoryJobStore::new())),
            tm_store: self.tm_store.unwrap_or_else(|| Arc::new(MemoryTmStore::new())),
        })
    }
}

// Project file

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    pub dir: String,
    pub extension: String,
    /// Overrides the project target languages for this content type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_langs: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    /// Path template, see [`FsTarget`]
    pub template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeSpec {
    pub name: String,
    pub source: SourceSpec,
    /// `{"type": "json", ...options}`
    #[serde(default = "default_filter")]
    pub filter: Value,
    #[serde(default)]
    pub decoders: Vec<String>,
    pub target: TargetSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Source language to the target languages served
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairs: Option<BTreeMap<String, Vec<String>>>,
    /// Everything else is handed to the provider constructor
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Contents of `l10n.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub source_lang: String,
    #[serde(default)]
    pub target_langs: Vec<String>,
    #[serde(default = "default_min_quality")]
    pub min_quality: u32,
    #[serde(default)]
    pub leverage: Option<Penalties>,
    /// Job store directory, relative to the project file
    #[serde(default = "default_job_store")]
    pub job_store: String,
    /// TM store directory, relative to the project file
    #[serde(default = "default_tm_store")]
    pub tm_store: String,
    pub content_types: Vec<ContentTypeSpec>,
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
}

fn default_filter() -> Value {
    serde_json::json!({ "type": "json" })
}

fn default_min_quality() -> u32 {
    50
}

fn default_job_store() -> String {
    "l10njobs".to_string()
}

fn default_tm_store() -> String {
    "l10ntm".to_string()
}

impl ProjectConfig {
    /// Look for a project file in `start` and its ancestors
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(PROJECT_FILE))
            .find(|path| path.is_file())
    }

    pub fn load(path: &Path) -> L10nResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            L10nError::Configuration(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            L10nError::Configuration(format!("Invalid project file '{}': {}", path.display(), e))
        })
    }

    /// Instantiate adapters, filters, decoders, providers and stores
    pub fn into_config(self, registry: &Registry, context: Context) -> L10nResult<Config> {
        let mut builder = ConfigBuilder::new(&self.source_lang)
            .target_langs(self.target_langs.as_slice())
            .min_quality(self.min_quality)
            .penalties(self.leverage.unwrap_or_default());

        for spec in self.content_types {
            let target_langs = spec
                .source
                .target_langs
                .unwrap_or_else(|| self.target_langs.clone());
            debug!(content_type = %spec.name, dir = %spec.source.dir, "Configuring content type");
            builder = builder.content_type(ContentType {
                source: Arc::new(FsSource::new(
                    context.resolve(&spec.source.dir),
                    &spec.source.extension,
                    &spec.name,
                    target_langs,
                )),
                filter: registry.create_filter(&spec.filter)?,
                decoders: registry.decoder_set(&spec.decoders)?,
                target: Arc::new(FsTarget::new(context.base_dir(), &spec.target.template)),
                name: spec.name,
            });
        }

        for spec in self.providers {
            let provider = registry.create_provider(&spec.kind, &spec.name, &spec.params)?;
            builder = match spec.pairs {
                None => builder.provider(provider),
                Some(pairs) => {
                    let pairs = pairs
                        .into_iter()
                        .flat_map(|(source, targets)| {
                            targets.into_iter().map(move |t| (source.clone(), t))
                        })
                        .collect();
                    builder.provider_for_pairs(provider, pairs)
                }
            };
        }

        let job_store = FsJobStore::new(context.resolve(&self.job_store))?;
        let tm_store = FsTmStore::new(context.resolve(&self.tm_store))?;
        builder
            .job_store(Arc::new(job_store))
            .tm_store(Arc::new(tm_store))
            .context(context)
            .build()
    }
}
