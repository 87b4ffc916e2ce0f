//! Normalized String Model
//!
//! A normalized string is the placeholder-aware form of a raw string: an
//! ordered list of literal text parts and placeholder parts. Placeholders are
//! recognized by the decoders in [`decoder`]; [`flatten`] turns a normalized
//! string into plain text with inline markers for translators that only
//! understand plain text.
//!
//! # Example
//!
//! ```ignore
//! use l10n_ledger::normalize::{DecoderSet, Part};
//!
//! let decoders = DecoderSet::from_names(&["doubleBrace"])?;
//! let nstr = decoders.decode("Hello {{name}}");
//! assert_eq!(nstr.parts()[1], Part::placeholder("doubleBrace", "{{name}}"));
//! assert_eq!(nstr.encode(), "Hello {{name}}");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod decoder;
pub mod flatten;

pub use decoder::{Decoder, DecoderSet, Decoded, ParseIssue, RegexDecoder};
pub use flatten::{PlaceholderMap, RecoveryReport, extract, flatten, recover_report};

/// One part of a normalized string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Part {
    /// Literal, translatable text
    Text { value: String },
    /// A placeholder in its directly substitutable raw form
    Placeholder {
        #[serde(rename = "type")]
        ty: String,
        value: String,
    },
}

impl Part {
    pub fn text(value: impl Into<String>) -> Self {
        Part::Text {
            value: value.into(),
        }
    }

    pub fn placeholder(ty: impl Into<String>, value: impl Into<String>) -> Self {
        Part::Placeholder {
            ty: ty.into(),
            value: value.into(),
        }
    }

    /// The raw text this part stands for
    pub fn value(&self) -> &str {
        match self {
            Part::Text { value } | Part::Placeholder { value, .. } => value,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Part::Placeholder { .. })
    }
}

/// Ordered sequence of text and placeholder parts.
///
/// Adjacent text parts are always merged and empty text parts are never
/// stored, so two normalized strings for the same raw input and decoder set
/// compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedString(Vec<Part>);

impl NormalizedString {
    pub fn new() -> Self {
        NormalizedString(Vec::new())
    }

    /// A normalized string with a single literal part
    pub fn from_raw(raw: &str) -> Self {
        let mut nstr = NormalizedString::new();
        nstr.push_text(raw);
        nstr
    }

    pub fn from_parts(parts: impl IntoIterator<Item = Part>) -> Self {
        let mut nstr = NormalizedString::new();
        for part in parts {
            nstr.push(part);
        }
        nstr
    }

    pub fn push(&mut self, part: Part) {
        match part {
            Part::Text { value } => self.push_text(&value),
            placeholder => self.0.push(placeholder),
        }
    }

    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Part::Text { value }) = self.0.last_mut() {
            value.push_str(text);
        } else {
            self.0.push(Part::text(text));
        }
    }

    pub fn push_placeholder(&mut self, ty: &str, value: &str) {
        self.0.push(Part::placeholder(ty, value));
    }

    pub fn parts(&self) -> &[Part] {
        &self.0
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn has_placeholders(&self) -> bool {
        self.0.iter().any(Part::is_placeholder)
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Part> {
        self.0.iter().filter(|p| p.is_placeholder())
    }

    /// Reproduces the raw string
    pub fn encode(&self) -> String {
        self.0.iter().map(Part::value).collect()
    }

    /// Concatenation of the literal parts only
    pub fn text_only(&self) -> String {
        self.0
            .iter()
            .filter(|p| !p.is_placeholder())
            .map(Part::value)
            .collect()
    }

    /// Placeholder values with their number of occurrences
    pub fn placeholder_multiset(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for part in self.placeholders() {
            *counts.entry(part.value()).or_insert(0) += 1;
        }
        counts
    }

    /// Whether `other` carries exactly the same placeholders, in any order.
    ///
    /// Literal text is ignored: this is the test that a candidate target is a
    /// legitimate translation of the source structure.
    pub fn is_compatible_with(&self, other: &NormalizedString) -> bool {
        self.placeholder_multiset() == other.placeholder_multiset()
    }
}

impl std::fmt::Display for NormalizedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl From<&str> for NormalizedString {
    fn from(raw: &str) -> Self {
        NormalizedString::from_raw(raw)
    }
}

impl FromIterator<Part> for NormalizedString {
    fn from_iter<I: IntoIterator<Item = Part>>(iter: I) -> Self {
        NormalizedString::from_parts(iter)
    }
}

impl<'a> IntoIterator for &'a NormalizedString {
    type Item = &'a Part;
    type IntoIter = std::slice::Iter<'a, Part>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_name() -> NormalizedString {
        NormalizedString::from_parts([
            Part::text("Hello "),
            Part::placeholder("doubleBrace", "{{name}}"),
        ])
    }

    #[test]
    fn test_encode_concatenates_parts() {
        assert_eq!(hello_name().encode(), "Hello {{name}}");
        assert_eq!(hello_name().text_only(), "Hello ");
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let nstr = NormalizedString::from_parts([Part::text("a"), Part::text(""), Part::text("b")]);
        assert_eq!(nstr.parts(), &[Part::text("ab")]);
    }

    #[test]
    fn test_empty_raw_has_no_parts() {
        assert!(NormalizedString::from_raw("").is_empty());
    }

    #[test]
    fn test_compatibility_ignores_text_and_order() {
        let src = NormalizedString::from_parts([
            Part::placeholder("x", "<b>"),
            Part::text("bold"),
            Part::placeholder("x", "</b>"),
            Part::placeholder("x", "{{n}}"),
        ]);
        let tgt = NormalizedString::from_parts([
            Part::placeholder("x", "{{n}}"),
            Part::text(" gras "),
            Part::placeholder("x", "<b>"),
            Part::placeholder("x", "</b>"),
        ]);
        assert!(src.is_compatible_with(&tgt));
        assert!(tgt.is_compatible_with(&src));
        assert!(src.is_compatible_with(&src));
    }

    #[test]
    fn test_dropped_placeholder_is_incompatible() {
        let tgt = NormalizedString::from_raw("Bonjour");
        assert!(!hello_name().is_compatible_with(&tgt));
        assert!(!tgt.is_compatible_with(&hello_name()));
    }

    #[test]
    fn test_duplicated_placeholder_is_incompatible() {
        let tgt = NormalizedString::from_parts([
            Part::placeholder("doubleBrace", "{{name}}"),
            Part::text(" et "),
            Part::placeholder("doubleBrace", "{{name}}"),
        ]);
        assert!(!hello_name().is_compatible_with(&tgt));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(hello_name()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"kind": "text", "value": "Hello "},
                {"kind": "placeholder", "type": "doubleBrace", "value": "{{name}}"}
            ])
        );
        let back: NormalizedString = serde_json::from_value(json).unwrap();
        assert_eq!(back, hello_name());
    }
}
