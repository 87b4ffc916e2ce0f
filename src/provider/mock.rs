//! Mock machine translator
//!
//! A deterministic, API-free translator used by tests and by the `mock`
//! provider type (e.g. a pig-latin pseudo-localization pass in regression
//! runs). Clones share their call counters, so a test can keep a handle on
//! the translator it gave to a provider.
//!
//! # Example
//!
//! ```ignore
//! let mock = MockTranslator::new(MockMode::Suffix);
//! let result = mock.translate("hello", "en", "fr").await?;
//! assert_eq!(result, "hello_fr");
//! ```

use super::machine::MachineTranslator;
use crate::error::{L10nError, L10nResult};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// How the mock translates
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append the target locale: "hello" → "hello_fr"
    Suffix,

    /// `(text, target_locale)` → translation, falling back to `Suffix`
    Mappings(HashMap<(String, String), String>),

    /// Reverse word order, as a stand-in for SOV target languages
    Reorder,

    /// Pig latin on every word, placeholder markers untouched
    PigLatin,

    /// Fail every call with this message
    Error(String),

    /// Return input unchanged
    NoOp,
}

impl MockMode {
    /// Parse the `mode` (and `mappings`/`message`) configuration keys
    pub fn from_params(params: &Map<String, Value>) -> L10nResult<Self> {
        let mode = params.get("mode").and_then(Value::as_str).unwrap_or("suffix");
        match mode {
            "suffix" => Ok(MockMode::Suffix),
            "reorder" => Ok(MockMode::Reorder),
            "pigLatin" => Ok(MockMode::PigLatin),
            "noop" => Ok(MockMode::NoOp),
            "error" => Ok(MockMode::Error(
                params
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("mock translator failure")
                    .to_string(),
            )),
            "mappings" => {
                // {"fr": {"Hello": "Bonjour"}}
                let mut mappings = HashMap::new();
                let by_lang = params.get("mappings").and_then(Value::as_object);
                for (lang, entries) in by_lang.into_iter().flatten() {
                    for (text, translation) in entries.as_object().into_iter().flatten() {
                        let translation = translation.as_str().ok_or_else(|| {
                            L10nError::Configuration(format!(
                                "Mapping for '{}' ({}) must be a string",
                                text, lang
                            ))
                        })?;
                        mappings.insert((text.clone(), lang.clone()), translation.to_string());
                    }
                }
                Ok(MockMode::Mappings(mappings))
            }
            other => Err(L10nError::Configuration(format!(
                "Unknown mock mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    batch_calls: Arc<AtomicUsize>,
    strings: Arc<AtomicUsize>,
}

fn pig_latin_word(word: &str) -> String {
    let is_vowel = |c: char| "aeiouAEIOU".contains(c);
    match word.find(is_vowel) {
        Some(0) => format!("{}way", word),
        Some(i) => format!("{}{}ay", &word[i..], &word[..i]),
        None => format!("{}ay", word),
    }
}

fn pig_latin(text: &str) -> L10nResult<String> {
    let words = Regex::new(r"_PH\d+_|[A-Za-z]+").map_err(|e| L10nError::Translation(e.to_string()))?;
    Ok(words
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let word = &caps[0];
            if word.starts_with("_PH") {
                word.to_string()
            } else {
                pig_latin_word(word)
            }
        })
        .into_owned())
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            batch_calls: Arc::new(AtomicUsize::new(0)),
            strings: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `translate_batch` calls so far
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Number of strings translated so far, single or batched
    pub fn strings_translated(&self) -> usize {
        self.strings.load(Ordering::SeqCst)
    }

    fn apply_translation(&self, text: &str, target: &str) -> L10nResult<String> {
        match &self.mode {
            MockMode::Suffix => Ok(format!("{}_{}", text, target)),
            MockMode::Mappings(map) => Ok(map
                .get(&(text.to_string(), target.to_string()))
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", text, target))),
            MockMode::Reorder => Ok(text.split_whitespace().rev().collect::<Vec<_>>().join(" ")),
            MockMode::PigLatin => pig_latin(text),
            MockMode::Error(msg) => Err(L10nError::Translation(msg.clone())),
            MockMode::NoOp => Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_locale: &str,
        target_locale: &str,
    ) -> L10nResult<String> {
        self.strings.fetch_add(1, Ordering::SeqCst);
        self.apply_translation(text, target_locale)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source_locale: &str,
        target_locale: &str,
    ) -> L10nResult<Vec<String>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.strings.fetch_add(texts.len(), Ordering::SeqCst);
        texts
            .iter()
            .map(|text| self.apply_translation(text, target_locale))
            .collect()
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_suffix() {
        let mock = MockTranslator::new(MockMode::Suffix);
        assert_eq!(mock.translate("hello", "en", "fr").await.unwrap(), "hello_fr");
        assert_eq!(mock.translate("", "en", "ru").await.unwrap(), "_ru");
    }

    #[tokio::test]
    async fn test_mappings_fall_back_to_suffix() {
        let mut map = HashMap::new();
        map.insert(("hello".to_string(), "fr".to_string()), "bonjour".to_string());
        let mock = MockTranslator::new(MockMode::Mappings(map));
        let texts = vec!["hello".to_string(), "unknown".to_string()];
        let results = mock.translate_batch(&texts, "en", "fr").await.unwrap();
        assert_eq!(results, vec!["bonjour", "unknown_fr"]);
    }

    #[tokio::test]
    async fn test_reorder_keeps_markers() {
        let mock = MockTranslator::new(MockMode::Reorder);
        let result = mock.translate("_PH1_ sent _PH2_", "en", "ja").await.unwrap();
        assert_eq!(result, "_PH2_ sent _PH1_");
    }

    #[tokio::test]
    async fn test_pig_latin() {
        let mock = MockTranslator::new(MockMode::PigLatin);
        assert_eq!(
            mock.translate("Hello _PH1_, apple!", "en", "it").await.unwrap(),
            "elloHay _PH1_, appleway!"
        );
        assert_eq!(mock.translate("rhythm", "en", "it").await.unwrap(), "rhythmay");
    }

    #[tokio::test]
    async fn test_error_mode() {
        let mock = MockTranslator::new(MockMode::Error("API unavailable".to_string()));
        match mock.translate("hello", "en", "fr").await {
            Err(L10nError::Translation(msg)) => assert_eq!(msg, "API unavailable"),
            other => panic!("Expected translation error, got {:?}", other),
        }
        assert!(mock.translate_batch(&["x".to_string()], "en", "fr").await.is_err());
    }

    #[tokio::test]
    async fn test_noop() {
        let mock = MockTranslator::new(MockMode::NoOp);
        let texts = vec!["hello".to_string(), "world".to_string()];
        assert_eq!(mock.translate_batch(&texts, "en", "fr").await.unwrap(), texts);
    }

    #[tokio::test]
    async fn test_clones_share_counters() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let clone = mock.clone();
        clone
            .translate_batch(&["a".to_string(), "b".to_string()], "en", "fr")
            .await
            .unwrap();
        clone.translate("c", "en", "fr").await.unwrap();
        assert_eq!(mock.batch_calls(), 1);
        assert_eq!(mock.strings_translated(), 3);
    }

    #[test]
    fn test_mode_from_params() {
        let params: Map<String, Value> =
            serde_json::from_str(r#"{"mode": "mappings", "mappings": {"fr": {"Hello": "Bonjour"}}}"#).unwrap();
        match MockMode::from_params(&params).unwrap() {
            MockMode::Mappings(map) => {
                assert_eq!(map.get(&("Hello".to_string(), "fr".to_string())).unwrap(), "Bonjour")
            }
            other => panic!("Expected mappings, got {:?}", other),
        }
        assert!(matches!(MockMode::from_params(&Map::new()).unwrap(), MockMode::Suffix));
        let bad: Map<String, Value> = serde_json::from_str(r#"{"mode": "klingon"}"#).unwrap();
        assert!(MockMode::from_params(&bad).is_err());
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(MockTranslator::new(MockMode::Suffix).provider_name(), "Mock Translator");
    }
}
