//! JSON resource filter
//!
//! Handles i18next / ARB style JSON: nested objects are flattened into
//! `.`-joined segment ids. With ARB annotations enabled, a sibling `@key`
//! object supplies translator notes for `key`; keys starting with `@@` are
//! file-level metadata and are not translatable.

use super::{AnnotationIssue, ParsedResource, ResourceFilter, Segment, Translator};
use crate::error::{L10nError, L10nResult};
use crate::lang::plural_suffix;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

const VALID_ANNOTATIONS: &[&str] = &[
    "description",
    "type",
    "context",
    "placeholders",
    "screenshot",
    "video",
    "source_text",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonFilterOptions {
    pub enable_arb_annotations: bool,
    pub enable_plural_suffixes: bool,
    /// Keep `@key` annotations of translated keys in generated resources
    pub emit_arb_annotations: bool,
}

#[derive(Debug, Clone, Default)]
pub struct JsonFilter {
    options: JsonFilterOptions,
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Render one annotation attribute as a line of notes
fn annotation_line(attribute: &str, data: &Value) -> String {
    match (attribute, data) {
        ("description", Value::String(s)) => s.clone(),
        ("description", other) => other.to_string(),
        ("placeholders", other) => format!("placeholders: {}", other),
        (_, Value::String(s)) => format!("{}: {}", attribute, s),
        (_, other) => format!("{}: {}", attribute, other),
    }
}

struct Walker {
    options: JsonFilterOptions,
    segments: Vec<Segment>,
    notes: HashMap<String, String>,
    issues: Vec<AnnotationIssue>,
}

impl Walker {
    fn object(&mut self, prefix: &str, obj: &Map<String, Value>) {
        for (key, value) in obj {
            let path = join(prefix, key);
            if self.options.enable_arb_annotations && key.starts_with('@') {
                if key.starts_with("@@") {
                    continue;
                }
                self.annotation(prefix, key, &path, value);
                continue;
            }
            self.value(&path, value);
        }
    }

    fn value(&mut self, path: &str, value: &Value) {
        match value {
            Value::String(s) => {
                let mut segment = Segment::new(path, s.as_str());
                segment.is_suffix_pluralized =
                    self.options.enable_plural_suffixes && plural_suffix(path).is_some();
                self.segments.push(segment);
            }
            Value::Object(obj) => self.object(path, obj),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.value(&join(path, &i.to_string()), item);
                }
            }
            other => debug!(sid = %path, value = %other, "Skipping non-string value"),
        }
    }

    fn annotation(&mut self, prefix: &str, key: &str, path: &str, value: &Value) {
        let sid = join(prefix, &key[1..]);
        let Value::Object(attributes) = value else {
            // Surfaced as a segment of its own so it shows up in analysis
            self.issue(&sid, format!("Annotation {} is not an object", path));
            self.value(path, value);
            return;
        };
        let mut lines = Vec::new();
        for (attribute, data) in attributes {
            if data.is_null() {
                continue;
            }
            if VALID_ANNOTATIONS.contains(&attribute.as_str()) {
                lines.push(annotation_line(attribute, data));
            } else {
                self.issue(&sid, format!("Unexpected {} annotation", attribute));
            }
        }
        if !lines.is_empty() {
            self.notes.insert(sid, lines.join("\n"));
        }
    }

    fn issue(&mut self, sid: &str, message: String) {
        warn!(sid = %sid, "{}", message);
        self.issues.push(AnnotationIssue {
            sid: sid.to_string(),
            message,
        });
    }
}

impl JsonFilter {
    pub fn new(options: JsonFilterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> JsonFilterOptions {
        self.options
    }

    fn parse_root(resource: &str) -> L10nResult<Option<Map<String, Value>>> {
        if resource.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_str(resource)
            .map_err(|e| L10nError::Filter(format!("Invalid JSON resource: {}", e)))?;
        match value {
            Value::Object(obj) => Ok(Some(obj)),
            _ => Err(L10nError::Filter(
                "Invalid JSON resource: root must be an object".to_string(),
            )),
        }
    }

    fn translate_value(
        &self,
        path: &str,
        value: &Value,
        translator: &mut Translator<'_>,
    ) -> Option<Value> {
        match value {
            Value::String(s) => translator(path, s).map(Value::String),
            Value::Object(obj) => {
                let translated = self.translate_object(path, obj, translator);
                (obj.is_empty() || !translated.is_empty()).then_some(Value::Object(translated))
            }
            Value::Array(items) => {
                let translated: Vec<Value> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| self.translate_value(&join(path, &i.to_string()), item, translator))
                    .collect();
                (items.is_empty() || !translated.is_empty()).then_some(Value::Array(translated))
            }
            other => Some(other.clone()),
        }
    }

    fn translate_object(
        &self,
        prefix: &str,
        obj: &Map<String, Value>,
        translator: &mut Translator<'_>,
    ) -> Map<String, Value> {
        let annotations = self.options.enable_arb_annotations;
        let mut out = Map::new();
        for (key, value) in obj {
            if annotations && key.starts_with('@') {
                continue;
            }
            if let Some(v) = self.translate_value(&join(prefix, key), value, translator) {
                out.insert(key.clone(), v);
            }
        }
        if annotations && self.options.emit_arb_annotations {
            for (key, value) in obj.iter().filter(|(k, _)| k.starts_with('@')) {
                let keep = key.starts_with("@@") || out.contains_key(&key[1..]);
                if keep {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        out
    }
}

impl ResourceFilter for JsonFilter {
    fn parse_resource(&self, resource: &str) -> L10nResult<ParsedResource> {
        let Some(root) = Self::parse_root(resource)? else {
            return Ok(ParsedResource::default());
        };
        let mut walker = Walker {
            options: self.options,
            segments: Vec::new(),
            notes: HashMap::new(),
            issues: Vec::new(),
        };
        walker.object("", &root);
        let Walker {
            mut segments,
            notes,
            issues,
            ..
        } = walker;
        for segment in &mut segments {
            segment.notes = notes.get(&segment.sid).cloned();
        }
        Ok(ParsedResource {
            segments,
            annotation_issues: issues,
        })
    }

    fn translate_resource(&self, resource: &str, translator: &mut Translator<'_>) -> L10nResult<String> {
        let Some(root) = Self::parse_root(resource)? else {
            return Ok(String::new());
        };
        let translated = self.translate_object("", &root, translator);
        let mut out = serde_json::to_string_pretty(&Value::Object(translated))?;
        out.push('\n');
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARB: &str = r#"{
        "@@locale": "en",
        "greeting": "Hello {{name}}",
        "@greeting": {
            "description": "Shown on the home page",
            "placeholders": {"name": {"type": "String"}},
            "mood": "cheerful"
        },
        "cart": {
            "items_one": "{{count}} item",
            "items_other": "{{count}} items"
        }
    }"#;

    fn arb_filter() -> JsonFilter {
        JsonFilter::new(JsonFilterOptions {
            enable_arb_annotations: true,
            enable_plural_suffixes: true,
            emit_arb_annotations: false,
        })
    }

    #[test]
    fn test_flattens_nested_keys() {
        let parsed = JsonFilter::default()
            .parse_resource(r#"{"a": {"b": "x", "c": {"d": "y"}}, "n": 3}"#)
            .unwrap();
        let sids: Vec<&str> = parsed.segments.iter().map(|s| s.sid.as_str()).collect();
        assert_eq!(sids, vec!["a.b", "a.c.d"]);
        assert_eq!(parsed.segment("a.c.d").unwrap().str, "y");
    }

    #[test]
    fn test_arb_annotations_become_notes() {
        let parsed = arb_filter().parse_resource(ARB).unwrap();
        assert_eq!(parsed.segments.len(), 3);
        let greeting = parsed.segment("greeting").unwrap();
        assert_eq!(
            greeting.notes.as_deref(),
            Some("Shown on the home page\nplaceholders: {\"name\":{\"type\":\"String\"}}")
        );
        assert_eq!(parsed.annotation_issues.len(), 1);
        assert_eq!(parsed.annotation_issues[0].sid, "greeting");
        assert!(parsed.annotation_issues[0].message.contains("mood"));
    }

    #[test]
    fn test_annotations_are_plain_keys_when_disabled() {
        let parsed = JsonFilter::default().parse_resource(ARB).unwrap();
        assert!(parsed.segment("@@locale").is_some());
        assert!(parsed.segment("@greeting.description").is_some());
        assert!(parsed.segments.iter().all(|s| s.notes.is_none()));
    }

    #[test]
    fn test_plural_suffixes() {
        let parsed = arb_filter().parse_resource(ARB).unwrap();
        assert!(parsed.segment("cart.items_one").unwrap().is_suffix_pluralized);
        assert!(!parsed.segment("greeting").unwrap().is_suffix_pluralized);

        let plain = JsonFilter::default().parse_resource(ARB).unwrap();
        assert!(!plain.segment("cart.items_one").unwrap().is_suffix_pluralized);
    }

    #[test]
    fn test_non_object_annotation_is_reported() {
        let parsed = arb_filter()
            .parse_resource(r#"{"title": "Home", "@title": "page title"}"#)
            .unwrap();
        assert_eq!(parsed.annotation_issues.len(), 1);
        assert!(parsed.segment("@title").is_some());
    }

    #[test]
    fn test_empty_and_invalid_resources() {
        assert!(JsonFilter::default().parse_resource("  ").unwrap().segments.is_empty());
        assert!(matches!(
            JsonFilter::default().parse_resource("[1, 2]"),
            Err(L10nError::Filter(_))
        ));
        assert!(JsonFilter::default().parse_resource("{").is_err());
    }

    #[test]
    fn test_translate_drops_missing_entries() {
        let source = r#"{"a": {"b": "Yes", "c": "No"}, "d": "Maybe"}"#;
        let out = JsonFilter::default()
            .translate_resource(source, &mut |sid, _| match sid {
                "a.b" => Some("Oui".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(out, "{\n  \"a\": {\n    \"b\": \"Oui\"\n  }\n}\n");
    }

    #[test]
    fn test_key_order_follows_the_source() {
        let source = r#"{"zebra": "Z", "apple": "A", "menu": {"quit": "Quit", "open": "Open"}}"#;
        let parsed = JsonFilter::default().parse_resource(source).unwrap();
        let sids: Vec<&str> = parsed.segments.iter().map(|s| s.sid.as_str()).collect();
        assert_eq!(sids, vec!["zebra", "apple", "menu.quit", "menu.open"]);

        let out = JsonFilter::default()
            .translate_resource(source, &mut |_, src| Some(src.to_lowercase()))
            .unwrap();
        assert_eq!(
            out,
            "{\n  \"zebra\": \"z\",\n  \"apple\": \"a\",\n  \"menu\": {\n    \"quit\": \"quit\",\n    \"open\": \"open\"\n  }\n}\n"
        );
    }

    #[test]
    fn test_translate_removes_emptied_objects() {
        let out = JsonFilter::default()
            .translate_resource(r#"{"a": {"b": "Yes"}}"#, &mut |_, _| None)
            .unwrap();
        assert_eq!(out, "{}\n");
    }

    #[test]
    fn test_translate_emits_annotations_of_translated_keys() {
        let filter = JsonFilter::new(JsonFilterOptions {
            emit_arb_annotations: true,
            ..arb_filter().options()
        });
        let out = filter
            .translate_resource(ARB, &mut |sid, src| (sid == "greeting").then(|| src.replace("Hello", "Bonjour")))
            .unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["greeting"], "Bonjour {{name}}");
        assert!(value.get("@greeting").is_some());
        assert!(value.get("cart").is_none());

        let stripped = arb_filter()
            .translate_resource(ARB, &mut |_, src| Some(src.to_string()))
            .unwrap();
        let value: Value = serde_json::from_str(&stripped).unwrap();
        assert!(value.get("@greeting").is_none());
        assert!(value.get("@@locale").is_none());
        assert_eq!(value["cart"]["items_other"], "{{count}} items");
    }

    #[test]
    fn test_options_from_json() {
        let options: JsonFilterOptions =
            serde_json::from_value(serde_json::json!({"enableArbAnnotations": true})).unwrap();
        assert!(options.enable_arb_annotations);
        assert!(!options.emit_arb_annotations);
    }
}
