//! Decoder Set
//!
//! Decoders recognize one placeholder syntax each and split literal text into
//! text and placeholder parts. A [`DecoderSet`] applies its decoders in the
//! configured order; every decoder only sees the literal text left over by the
//! decoders before it, so decoding is idempotent and order-stable.
//!
//! A placeholder opener left in literal text after decoding (for example
//! `{{name` without its closing braces) is reported as a [`ParseIssue`]. Parse
//! issues are content-quality findings, never errors.

use super::{NormalizedString, Part};
use crate::error::{L10nError, L10nResult};
use regex::{Captures, Regex};
use std::sync::Arc;

/// Recognizer for one placeholder syntax
pub trait Decoder: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Split one chunk of literal text into parts
    fn decode_text(&self, text: &str) -> Vec<Part>;

    /// Byte offsets (within `text`) of placeholder openers that were not
    /// closed. Only called on text that is still literal after decoding.
    fn unbalanced_openers(&self, _text: &str) -> Vec<usize> {
        Vec::new()
    }
}

/// Maps a regex match to a placeholder part, or `None` to keep it literal
pub type Classifier = fn(&Captures<'_>) -> Option<Part>;

/// Decoder driven by a regular expression
#[derive(Debug)]
pub struct RegexDecoder {
    name: String,
    pattern: Regex,
    opener: Option<Regex>,
    classify: Classifier,
}

impl RegexDecoder {
    /// Create a decoder
    ///
    /// # Arguments
    /// * `name` - Decoder name, used in parse issues and configuration
    /// * `pattern` - Regex matching a complete placeholder
    /// * `opener` - Optional regex matching the start of a placeholder, used
    ///   to detect placeholders that were never closed
    /// * `classify` - Turns a match into a placeholder part
    pub fn new(
        name: &str,
        pattern: &str,
        opener: Option<&str>,
        classify: Classifier,
    ) -> L10nResult<Self> {
        let compile = |re: &str| {
            Regex::new(re).map_err(|e| {
                L10nError::Configuration(format!("Invalid pattern for decoder '{}': {}", name, e))
            })
        };
        Ok(Self {
            name: name.to_string(),
            pattern: compile(pattern)?,
            opener: opener.map(compile).transpose()?,
            classify,
        })
    }
}

impl Decoder for RegexDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode_text(&self, text: &str) -> Vec<Part> {
        let mut parts = Vec::new();
        let mut last = 0;
        for caps in self.pattern.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if let Some(part) = (self.classify)(&caps) {
                if m.start() > last {
                    parts.push(Part::text(&text[last..m.start()]));
                }
                parts.push(part);
                last = m.end();
            }
        }
        if last < text.len() {
            parts.push(Part::text(&text[last..]));
        }
        parts
    }

    fn unbalanced_openers(&self, text: &str) -> Vec<usize> {
        match &self.opener {
            Some(opener) => opener.find_iter(text).map(|m| m.start()).collect(),
            None => Vec::new(),
        }
    }
}

/// A placeholder opener without its balancing close
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseIssue {
    pub decoder: String,
    /// Byte offset in the raw string
    pub offset: usize,
    pub snippet: String,
}

/// Outcome of decoding with issue reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub nstr: NormalizedString,
    pub issues: Vec<ParseIssue>,
}

/// Ordered list of decoders
#[derive(Debug, Clone, Default)]
pub struct DecoderSet {
    decoders: Vec<Arc<dyn Decoder>>,
}

impl DecoderSet {
    pub fn new(decoders: Vec<Arc<dyn Decoder>>) -> Self {
        Self { decoders }
    }

    /// Build a set from built-in decoder names, in the given order
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> L10nResult<Self> {
        let decoders = names
            .iter()
            .map(|name| builtin(name.as_ref()).map(|d| Arc::new(d) as Arc<dyn Decoder>))
            .collect::<L10nResult<Vec<_>>>()?;
        Ok(Self::new(decoders))
    }

    pub fn push(&mut self, decoder: Arc<dyn Decoder>) {
        self.decoders.push(decoder);
    }

    pub fn names(&self) -> Vec<&str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode a raw string, ignoring parse issues
    pub fn decode(&self, raw: &str) -> NormalizedString {
        self.decode_with_issues(raw).nstr
    }

    /// Decode a raw string and report unbalanced placeholder openers
    pub fn decode_with_issues(&self, raw: &str) -> Decoded {
        let mut parts = vec![Part::text(raw)];
        for decoder in &self.decoders {
            parts = parts
                .into_iter()
                .flat_map(|part| match part {
                    Part::Text { value } => decoder.decode_text(&value),
                    placeholder => vec![placeholder],
                })
                .collect();
        }
        let nstr = NormalizedString::from_parts(parts);

        let mut issues = Vec::new();
        let mut offset = 0;
        for part in nstr.parts() {
            if let Part::Text { value } = part {
                for decoder in &self.decoders {
                    for pos in decoder.unbalanced_openers(value) {
                        issues.push(ParseIssue {
                            decoder: decoder.name().to_string(),
                            offset: offset + pos,
                            snippet: value[pos..].chars().take(20).collect(),
                        });
                    }
                }
            }
            offset += part.value().len();
        }
        issues.sort_by_key(|i| i.offset);
        Decoded { nstr, issues }
    }
}

/// Names of the built-in decoders
pub const BUILTIN_DECODERS: &[&str] = &[
    "doubleBrace",
    "i18nextKey",
    "xmlTag",
    "xmlEntity",
    "printf",
    "dollarParam",
    "braceParam",
];

/// Instantiate a built-in decoder by name
pub fn builtin(name: &str) -> L10nResult<RegexDecoder> {
    match name {
        "doubleBrace" => RegexDecoder::new(name, r"\{\{[^{}]+\}\}", Some(r"\{\{"), |caps| {
            Some(Part::placeholder("doubleBrace", &caps[0]))
        }),
        // i18next v4: "reuse $t(keyDeep.inner)" and "replace this {{value}}"
        "i18nextKey" => RegexDecoder::new(
            name,
            r"(?P<nesting>\$t\([\w:.]+\))|(?P<brace>\{\{[^}]+\}\})",
            Some(r"\$t\(|\{\{"),
            |caps| {
                if let Some(m) = caps.name("nesting") {
                    Some(Part::placeholder("nesting", m.as_str()))
                } else {
                    caps.name("brace")
                        .map(|m| Part::placeholder("doubleBrace", m.as_str()))
                }
            },
        ),
        "xmlTag" => RegexDecoder::new(name, r"</?[A-Za-z][^<>]*>", Some(r"<[A-Za-z/]"), |caps| {
            let tag = &caps[0];
            let ty = if tag.starts_with("</") {
                "tagClose"
            } else if tag.ends_with("/>") {
                "tagEmpty"
            } else {
                "tagOpen"
            };
            Some(Part::placeholder(ty, tag))
        }),
        "xmlEntity" => RegexDecoder::new(
            name,
            r"&(?:[A-Za-z][A-Za-z0-9]*|#[0-9]+|#[xX][0-9A-Fa-f]+);",
            None,
            |caps| Some(Part::placeholder("entity", &caps[0])),
        ),
        "printf" => RegexDecoder::new(
            name,
            r"%%|%(?:\d+\$)?[-+0 #]*\d*(?:\.\d+)?(?:ll|l|h)?[sdifuxXoceEgG@]",
            None,
            |caps| Some(Part::placeholder("printf", &caps[0])),
        ),
        // MediaWiki style $1, $2
        "dollarParam" => RegexDecoder::new(name, r"\$\d+", None, |caps| {
            Some(Part::placeholder("param", &caps[0]))
        }),
        "braceParam" => RegexDecoder::new(
            name,
            r"\{[A-Za-z_][\w]*(?:,[^{}]*)?\}",
            Some(r"\{[A-Za-z_]"),
            |caps| Some(Part::placeholder("brace", &caps[0])),
        ),
        other => Err(L10nError::Configuration(format!(
            "Unknown decoder '{}' (available: {})",
            other,
            BUILTIN_DECODERS.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> DecoderSet {
        DecoderSet::from_names(names).unwrap()
    }

    #[test]
    fn test_double_brace_scenario() {
        let nstr = set(&["doubleBrace"]).decode("Hello {{name}}");
        assert_eq!(
            nstr.parts(),
            &[
                Part::text("Hello "),
                Part::placeholder("doubleBrace", "{{name}}")
            ]
        );
    }

    #[test]
    fn test_round_trip_across_decoders() {
        let decoders = set(&["xmlTag", "xmlEntity", "i18nextKey", "printf", "dollarParam"]);
        let samples = [
            "",
            "plain text",
            "Hello {{name}}, see $t(common.more)",
            "<b>Bold</b> &amp; <br/> done",
            "%1$s has %d items (100%%)",
            "$1 sent $2 messages",
            "Unclosed {{name and <b stray",
            "Ünïcödé <i>текст</i> 日本語 {{x}}",
        ];
        for raw in samples {
            assert_eq!(decoders.decode(raw).encode(), raw, "round trip of {:?}", raw);
        }
    }

    #[test]
    fn test_decode_is_idempotent() {
        let decoders = set(&["xmlTag", "i18nextKey"]);
        let raw = "<a href=\"x\">{{count}} items</a>";
        assert_eq!(decoders.decode(raw), decoders.decode(raw));
        let again = decoders.decode(&decoders.decode(raw).encode());
        assert_eq!(again, decoders.decode(raw));
    }

    #[test]
    fn test_xml_tag_types() {
        let nstr = set(&["xmlTag"]).decode("<b>x</b><br/>");
        let types: Vec<_> = nstr
            .placeholders()
            .map(|p| match p {
                Part::Placeholder { ty, .. } => ty.as_str(),
                Part::Text { .. } => "",
            })
            .collect();
        assert_eq!(types, vec!["tagOpen", "tagClose", "tagEmpty"]);
    }

    #[test]
    fn test_i18next_nesting_and_interpolation() {
        let nstr = set(&["i18nextKey"]).decode("reuse $t(keyDeep.inner) with {{value}}");
        let placeholders: Vec<_> = nstr.placeholders().cloned().collect();
        assert_eq!(
            placeholders,
            vec![
                Part::placeholder("nesting", "$t(keyDeep.inner)"),
                Part::placeholder("doubleBrace", "{{value}}"),
            ]
        );
    }

    #[test]
    fn test_decoder_order_matters() {
        // braceParam before doubleBrace eats the inner brace pair
        let inner_first = set(&["braceParam", "doubleBrace"]).decode("{{name}}");
        let outer_first = set(&["doubleBrace", "braceParam"]).decode("{{name}}");
        assert_eq!(outer_first.parts(), &[Part::placeholder("doubleBrace", "{{name}}")]);
        assert_eq!(inner_first.placeholders().count(), 1);
        assert_eq!(inner_first.len(), 3);
    }

    #[test]
    fn test_unbalanced_opener_is_reported_not_fatal() {
        let decoded = set(&["doubleBrace"]).decode_with_issues("Hi {{name, welcome {{x}}");
        assert_eq!(decoded.nstr.encode(), "Hi {{name, welcome {{x}}");
        assert_eq!(decoded.issues.len(), 1);
        assert_eq!(decoded.issues[0].decoder, "doubleBrace");
        assert_eq!(decoded.issues[0].offset, 3);
        assert!(decoded.issues[0].snippet.starts_with("{{name"));
    }

    #[test]
    fn test_no_decoders_yields_single_text() {
        let nstr = DecoderSet::default().decode("Hello {{name}}");
        assert_eq!(nstr.parts(), &[Part::text("Hello {{name}}")]);
    }

    #[test]
    fn test_unknown_decoder_is_configuration_error() {
        let err = DecoderSet::from_names(&["nope"]).unwrap_err();
        assert!(matches!(err, L10nError::Configuration(_)));
    }

    #[test]
    fn test_printf_variants() {
        let nstr = set(&["printf"]).decode("%s of %1$d at 50%% %@");
        let values: Vec<_> = nstr.placeholders().map(Part::value).collect();
        assert_eq!(values, vec!["%s", "%1$d", "%%", "%@"]);
    }
}
