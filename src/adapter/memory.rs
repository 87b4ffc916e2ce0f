use super::{ResourceMeta, SourceAdapter, TargetAdapter};
use crate::error::{L10nError, L10nResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Source resources held in memory
#[derive(Debug, Default)]
pub struct MemorySource {
    resources: RwLock<BTreeMap<String, (ResourceMeta, String)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a resource
    pub fn insert(&self, rid: &str, content_type: &str, target_langs: &[&str], content: &str) {
        let meta = ResourceMeta {
            id: rid.to_string(),
            modified: None,
            target_langs: target_langs.iter().map(|l| l.to_string()).collect(),
            content_type: content_type.to_string(),
        };
        if let Ok(mut resources) = self.resources.write() {
            resources.insert(rid.to_string(), (meta, content.to_string()));
        }
    }

    pub fn with_resource(self, rid: &str, content_type: &str, target_langs: &[&str], content: &str) -> Self {
        self.insert(rid, content_type, target_langs, content);
        self
    }

    pub fn remove(&self, rid: &str) {
        if let Ok(mut resources) = self.resources.write() {
            resources.remove(rid);
        }
    }
}

#[async_trait]
impl SourceAdapter for MemorySource {
    async fn fetch_resource_stats(&self) -> L10nResult<Vec<ResourceMeta>> {
        let resources = self
            .resources
            .read()
            .map_err(|_| L10nError::Configuration("Source lock poisoned".to_string()))?;
        Ok(resources.values().map(|(meta, _)| meta.clone()).collect())
    }

    async fn fetch_resource(&self, rid: &str) -> L10nResult<String> {
        let resources = self
            .resources
            .read()
            .map_err(|_| L10nError::Configuration("Source lock poisoned".to_string()))?;
        resources
            .get(rid)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| L10nError::FetchFailure {
                lang: "source".to_string(),
                rid: rid.to_string(),
                reason: "no such resource".to_string(),
            })
    }
}

/// Translated resources held in memory, keyed by `(lang, rid)`
#[derive(Debug, Default)]
pub struct MemoryTarget {
    resources: RwLock<HashMap<(String, String), String>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, lang: &str, rid: &str, content: &str) -> Self {
        if let Ok(mut resources) = self.resources.write() {
            resources.insert((lang.to_string(), rid.to_string()), content.to_string());
        }
        self
    }

    pub fn get(&self, lang: &str, rid: &str) -> Option<String> {
        self.resources
            .read()
            .ok()?
            .get(&(lang.to_string(), rid.to_string()))
            .cloned()
    }
}

#[async_trait]
impl TargetAdapter for MemoryTarget {
    fn translated_resource_id(&self, lang: &str, rid: &str) -> String {
        format!("{}/{}", lang, rid)
    }

    async fn fetch_translated_resource(&self, lang: &str, rid: &str) -> L10nResult<String> {
        self.get(lang, rid).ok_or_else(|| L10nError::FetchFailure {
            lang: lang.to_string(),
            rid: rid.to_string(),
            reason: "no such resource".to_string(),
        })
    }

    async fn commit_translated_resource(&self, lang: &str, rid: &str, content: &str) -> L10nResult<()> {
        let mut resources = self
            .resources
            .write()
            .map_err(|_| L10nError::Configuration("Target lock poisoned".to_string()))?;
        resources.insert((lang.to_string(), rid.to_string()), content.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemorySource::new()
            .with_resource("b.json", "json", &["fr"], "{}")
            .with_resource("a.json", "json", &["fr", "de"], r#"{"k": "v"}"#);
        let stats = source.fetch_resource_stats().await.unwrap();
        assert_eq!(stats[0].id, "a.json");
        assert_eq!(stats[0].target_langs.len(), 2);
        assert_eq!(source.fetch_resource("b.json").await.unwrap(), "{}");
        assert!(source.fetch_resource("c.json").await.is_err());

        source.remove("b.json");
        assert_eq!(source.fetch_resource_stats().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_target() {
        let target = MemoryTarget::new().with_resource("fr", "a.json", "{}");
        assert_eq!(target.fetch_translated_resource("fr", "a.json").await.unwrap(), "{}");
        assert!(matches!(
            target.fetch_translated_resource("de", "a.json").await,
            Err(L10nError::FetchFailure { .. })
        ));
        target.commit_translated_resource("de", "a.json", "{\"k\": \"w\"}").await.unwrap();
        assert_eq!(target.get("de", "a.json").as_deref(), Some("{\"k\": \"w\"}"));
    }
}
