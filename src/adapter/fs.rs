use super::{ResourceMeta, SourceAdapter, TargetAdapter};
use crate::error::{L10nError, L10nResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads every file with a given extension from one directory
///
/// The directory is not scanned recursively; the file name is the resource id.
#[derive(Debug, Clone)]
pub struct FsSource {
    dir: PathBuf,
    extension: String,
    content_type: String,
    target_langs: Vec<String>,
}

impl FsSource {
    pub fn new(
        dir: impl Into<PathBuf>,
        extension: &str,
        content_type: &str,
        target_langs: Vec<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
            content_type: content_type.to_string(),
            target_langs,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl SourceAdapter for FsSource {
    async fn fetch_resource_stats(&self) -> L10nResult<Vec<ResourceMeta>> {
        if !self.dir.is_dir() {
            return Err(L10nError::Configuration(format!(
                "Source directory not found: {}",
                self.dir.display()
            )));
        }
        let mut stats = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
                warn!(path = %path.display(), "Skipping file with non UTF-8 name");
                continue;
            };
            let modified = fs::metadata(&path)?.modified().ok().map(DateTime::<Utc>::from);
            stats.push(ResourceMeta {
                id: id.to_string(),
                modified,
                target_langs: self.target_langs.clone(),
                content_type: self.content_type.clone(),
            });
        }
        stats.sort_by(|a, b| a.id.cmp(&b.id));
        if stats.is_empty() {
            warn!(dir = %self.dir.display(), extension = %self.extension, "No source resources found");
        }
        Ok(stats)
    }

    async fn fetch_resource(&self, rid: &str) -> L10nResult<String> {
        Ok(fs::read_to_string(self.dir.join(rid))?)
    }
}

/// Writes translated resources to paths built from a template.
///
/// The template is relative to the base directory and may use `{lang}`,
/// `{rid}` (the source resource id) and `{file}` (the id without its
/// extension), e.g. `locales/{lang}/{rid}` or `lib/l10n/{file}_{lang}.arb`.
#[derive(Debug, Clone)]
pub struct FsTarget {
    base_dir: PathBuf,
    template: String,
}

impl FsTarget {
    pub fn new(base_dir: impl Into<PathBuf>, template: &str) -> Self {
        Self {
            base_dir: base_dir.into(),
            template: template.to_string(),
        }
    }

    fn path(&self, lang: &str, rid: &str) -> PathBuf {
        self.base_dir.join(self.translated_resource_id(lang, rid))
    }
}

#[async_trait]
impl TargetAdapter for FsTarget {
    fn translated_resource_id(&self, lang: &str, rid: &str) -> String {
        let file = Path::new(rid)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(rid);
        self.template
            .replace("{lang}", lang)
            .replace("{rid}", rid)
            .replace("{file}", file)
    }

    async fn fetch_translated_resource(&self, lang: &str, rid: &str) -> L10nResult<String> {
        let path = self.path(lang, rid);
        fs::read_to_string(&path).map_err(|e| L10nError::FetchFailure {
            lang: lang.to_string(),
            rid: rid.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }

    async fn commit_translated_resource(&self, lang: &str, rid: &str, content: &str) -> L10nResult<()> {
        let path = self.path(lang, rid);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(lang = %lang, rid = %rid, path = %path.display(), "Committing translated resource");
        fs::write(path, content)?;
        Ok(())
    }
}
