//! Plugin registry
//!
//! Maps the names used in configuration to constructors for providers,
//! decoders and resource filters. Each provider type declares its
//! capabilities when registered; instances that disagree with their
//! declaration are rejected when constructed.

use crate::error::{L10nError, L10nResult};
use crate::filter::{JsonFilter, JsonFilterOptions, ResourceFilter};
use crate::normalize::decoder::{BUILTIN_DECODERS, builtin};
use crate::normalize::{Decoder, DecoderSet};
use crate::provider::{
    Capabilities, DeferredProvider, Grandfather, MachineProvider, MockMode, MockTranslator,
    Repetition, TranslationProvider,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a provider from its configured name and parameters
pub type ProviderConstructor =
    fn(&str, &Map<String, Value>) -> L10nResult<Arc<dyn TranslationProvider>>;

/// Builds a decoder from its registered name
pub type DecoderConstructor = fn(&str) -> L10nResult<Arc<dyn Decoder>>;

/// Builds a filter from its configuration object
pub type FilterConstructor = fn(&Value) -> L10nResult<Arc<dyn ResourceFilter>>;

#[derive(Clone, Copy)]
struct ProviderPlugin {
    capabilities: Capabilities,
    constructor: ProviderConstructor,
}

#[derive(Default)]
pub struct Registry {
    providers: BTreeMap<String, ProviderPlugin>,
    decoders: BTreeMap<String, DecoderConstructor>,
    filters: BTreeMap<String, FilterConstructor>,
}

fn quality_param(name: &str, params: &Map<String, Value>, default: u32) -> L10nResult<u32> {
    match params.get("quality") {
        None => Ok(default),
        Some(v) => v
            .as_u64()
            .and_then(|q| u32::try_from(q).ok())
            .ok_or_else(|| {
                L10nError::Configuration(format!("Provider '{}': quality must be a non-negative integer", name))
            }),
    }
}

fn grandfather(name: &str, params: &Map<String, Value>) -> L10nResult<Arc<dyn TranslationProvider>> {
    Ok(Arc::new(Grandfather::from_params(name, params)?))
}

fn repetition(name: &str, params: &Map<String, Value>) -> L10nResult<Arc<dyn TranslationProvider>> {
    Ok(Arc::new(Repetition::from_params(name, params)?))
}

fn mock(name: &str, params: &Map<String, Value>) -> L10nResult<Arc<dyn TranslationProvider>> {
    let translator = MockTranslator::new(MockMode::from_params(params)?);
    Ok(Arc::new(MachineProvider::new(name, translator, quality_param(name, params, 1)?)))
}

fn deferred_mock(name: &str, params: &Map<String, Value>) -> L10nResult<Arc<dyn TranslationProvider>> {
    let translator = MockTranslator::new(MockMode::from_params(params)?);
    let inner = MachineProvider::new(name, translator, quality_param(name, params, 1)?);
    let seconds = params
        .get("turnaroundSeconds")
        .map(|v| {
            v.as_i64().ok_or_else(|| {
                L10nError::Configuration(format!("Provider '{}': turnaroundSeconds must be an integer", name))
            })
        })
        .transpose()?
        .unwrap_or(0);
    let mut provider = DeferredProvider::new(inner).with_turnaround(chrono::Duration::seconds(seconds));
    if let Some(partial) = params.get("partial").and_then(Value::as_u64) {
        provider = provider.with_partial(partial as usize);
    }
    Ok(Arc::new(provider))
}

fn builtin_decoder(name: &str) -> L10nResult<Arc<dyn Decoder>> {
    Ok(Arc::new(builtin(name)?))
}

fn json_filter(spec: &Value) -> L10nResult<Arc<dyn ResourceFilter>> {
    let options: JsonFilterOptions = serde_json::from_value(spec.clone())
        .map_err(|e| L10nError::Configuration(format!("Invalid json filter options: {}", e)))?;
    Ok(Arc::new(JsonFilter::new(options)))
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in provider type, decoder and filter
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let providers: [(&str, Capabilities, ProviderConstructor); 4] = [
            ("grandfather", Capabilities::SYNC_REFRESH, grandfather),
            ("repetition", Capabilities::SYNC, repetition),
            ("mock", Capabilities::SYNC, mock),
            ("deferredMock", Capabilities::ASYNC, deferred_mock),
        ];
        for (kind, capabilities, constructor) in providers {
            registry.providers.insert(
                kind.to_string(),
                ProviderPlugin {
                    capabilities,
                    constructor,
                },
            );
        }
        for name in BUILTIN_DECODERS {
            registry.decoders.insert(name.to_string(), builtin_decoder);
        }
        registry.filters.insert("json".to_string(), json_filter);
        registry
    }

    /// Register a provider type with its declared capabilities
    pub fn register_provider(
        &mut self,
        kind: &str,
        capabilities: Capabilities,
        constructor: ProviderConstructor,
    ) -> L10nResult<()> {
        if !capabilities.request {
            return Err(L10nError::Configuration(format!(
                "Provider type '{}' must support translation requests",
                kind
            )));
        }
        if self.providers.contains_key(kind) {
            return Err(L10nError::Configuration(format!(
                "Provider type '{}' is already registered",
                kind
            )));
        }
        self.providers.insert(
            kind.to_string(),
            ProviderPlugin {
                capabilities,
                constructor,
            },
        );
        Ok(())
    }

    pub fn register_decoder(&mut self, name: &str, constructor: DecoderConstructor) -> L10nResult<()> {
        if self.decoders.contains_key(name) {
            return Err(L10nError::Configuration(format!(
                "Decoder '{}' is already registered",
                name
            )));
        }
        self.decoders.insert(name.to_string(), constructor);
        Ok(())
    }

    pub fn register_filter(&mut self, kind: &str, constructor: FilterConstructor) -> L10nResult<()> {
        if self.filters.contains_key(kind) {
            return Err(L10nError::Configuration(format!(
                "Filter '{}' is already registered",
                kind
            )));
        }
        self.filters.insert(kind.to_string(), constructor);
        Ok(())
    }

    pub fn provider_types(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Declared capabilities of a provider type
    pub fn capabilities(&self, kind: &str) -> Option<Capabilities> {
        self.providers.get(kind).map(|p| p.capabilities)
    }

    pub fn create_provider(
        &self,
        kind: &str,
        name: &str,
        params: &Map<String, Value>,
    ) -> L10nResult<Arc<dyn TranslationProvider>> {
        let plugin = self.providers.get(kind).ok_or_else(|| {
            L10nError::Configuration(format!(
                "Unknown provider type '{}' for '{}' (known: {})",
                kind,
                name,
                self.provider_types().join(", ")
            ))
        })?;
        let provider = (plugin.constructor)(name, params)?;
        if provider.capabilities() != plugin.capabilities {
            return Err(L10nError::Configuration(format!(
                "Provider '{}' of type '{}' does not match its declared capabilities",
                name, kind
            )));
        }
        Ok(provider)
    }

    /// Decoders in the given order
    pub fn decoder_set<S: AsRef<str>>(&self, names: &[S]) -> L10nResult<DecoderSet> {
        let mut set = DecoderSet::default();
        for name in names {
            let name = name.as_ref();
            let constructor = self
                .decoders
                .get(name)
                .ok_or_else(|| L10nError::Configuration(format!("Unknown decoder '{}'", name)))?;
            set.push(constructor(name)?);
        }
        Ok(set)
    }

    /// A filter from `{"type": <kind>, ...options}`
    pub fn create_filter(&self, spec: &Value) -> L10nResult<Arc<dyn ResourceFilter>> {
        let kind = spec
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| L10nError::Configuration("Filter needs a type".to_string()))?;
        let constructor = self
            .filters
            .get(kind)
            .ok_or_else(|| L10nError::Configuration(format!("Unknown filter '{}'", kind)))?;
        let mut options = spec.clone();
        if let Value::Object(map) = &mut options {
            map.remove("type");
        }
        constructor(&options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Part;

    fn params(json: &str) -> Map<String, Value> {
        serde_json::from_str(json).unwrap()
    }

    fn sloppy(name: &str, _params: &Map<String, Value>) -> L10nResult<Arc<dyn TranslationProvider>> {
        // Declared async below, but actually sync
        Ok(Arc::new(Repetition::new(name, Default::default())))
    }

    #[test]
    fn test_builtin_providers() {
        let registry = Registry::with_builtins();
        assert_eq!(
            registry.provider_types(),
            vec!["deferredMock", "grandfather", "mock", "repetition"]
        );
        let piggy = registry
            .create_provider("mock", "Piggy", &params(r#"{"mode": "pigLatin", "quality": 1}"#))
            .unwrap();
        assert_eq!(piggy.name(), "Piggy");
        assert_eq!(piggy.capabilities(), Capabilities::SYNC);

        let slow = registry
            .create_provider("deferredMock", "Slow", &params(r#"{"turnaroundSeconds": 60}"#))
            .unwrap();
        assert!(slow.capabilities().is_async());
    }

    #[test]
    fn test_unknown_and_invalid_providers() {
        let registry = Registry::with_builtins();
        assert!(matches!(
            registry.create_provider("deepl", "DeepL", &Map::new()),
            Err(L10nError::Configuration(_))
        ));
        assert!(registry
            .create_provider("grandfather", "Grandfather", &Map::new())
            .is_err());
        assert!(registry
            .create_provider("mock", "Piggy", &params(r#"{"quality": "high"}"#))
            .is_err());
    }

    #[test]
    fn test_capabilities_are_validated() {
        let mut registry = Registry::new();
        assert!(registry
            .register_provider(
                "fetchOnly",
                Capabilities {
                    request: false,
                    fetch: true,
                    refresh: false
                },
                sloppy
            )
            .is_err());

        registry.register_provider("sloppy", Capabilities::ASYNC, sloppy).unwrap();
        assert!(registry.register_provider("sloppy", Capabilities::ASYNC, sloppy).is_err());
        assert_eq!(registry.capabilities("sloppy"), Some(Capabilities::ASYNC));
        assert!(matches!(
            registry.create_provider("sloppy", "Sloppy", &Map::new()),
            Err(L10nError::Configuration(_))
        ));
    }

    #[test]
    fn test_decoder_set_preserves_order() {
        let registry = Registry::with_builtins();
        let set = registry.decoder_set(&["xmlTag", "doubleBrace"]).unwrap();
        assert_eq!(set.names(), vec!["xmlTag", "doubleBrace"]);
        let nstr = set.decode("<b>{{n}}</b>");
        assert_eq!(nstr.parts()[1], Part::placeholder("doubleBrace", "{{n}}"));
        assert!(registry.decoder_set(&["nope"]).is_err());
    }

    #[test]
    fn test_filters() {
        let registry = Registry::with_builtins();
        let filter = registry
            .create_filter(&serde_json::json!({"type": "json", "enablePluralSuffixes": true}))
            .unwrap();
        let parsed = filter.parse_resource(r#"{"n_one": "x"}"#).unwrap();
        assert!(parsed.segments[0].is_suffix_pluralized);
        assert!(registry.create_filter(&serde_json::json!({"type": "po"})).is_err());
        assert!(registry.create_filter(&serde_json::json!({})).is_err());
    }
}
