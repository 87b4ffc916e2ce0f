//! Marker protection for plain-text translators
//!
//! Translators that only understand plain text must not see (or translate)
//! placeholders. [`flatten`] replaces every placeholder of a normalized string
//! with a stable, non-translatable marker and returns the map needed to undo
//! it; [`extract`] turns the translated plain text back into a normalized
//! string.
//!
//! Marker format: `_PH{index}_`, 1-based, one index per distinct placeholder
//! value in order of first appearance.
//!
//! # Example: word reordering
//!
//! ```ignore
//! Source:      [text "Send ", ph "<b>", text "now", ph "</b>"]
//! Flattened:   "Send _PH1_now_PH2_"
//! Translated:  "_PH1_Maintenant_PH2_ envoyer"
//! Extracted:   [ph "<b>", text "Maintenant", ph "</b>", text " envoyer"]
//! ```

use super::{NormalizedString, Part};
use std::collections::BTreeMap;

/// Marker index to the placeholder it stands for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderMap(BTreeMap<usize, Part>);

impl PlaceholderMap {
    pub fn get(&self, index: usize) -> Option<&Part> {
        self.0.get(&index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.keys().copied()
    }
}

/// The marker for a placeholder index
pub fn marker(index: usize) -> String {
    format!("_PH{}_", index)
}

/// Replace placeholders with markers
pub fn flatten(nsrc: &NormalizedString) -> (String, PlaceholderMap) {
    let mut flat = String::new();
    let mut map = BTreeMap::new();
    let mut by_value: BTreeMap<&str, usize> = BTreeMap::new();
    for part in nsrc {
        match part {
            Part::Text { value } => flat.push_str(value),
            Part::Placeholder { value, .. } => {
                let next = by_value.len() + 1;
                let index = *by_value.entry(value.as_str()).or_insert(next);
                map.entry(index).or_insert_with(|| part.clone());
                flat.push_str(&marker(index));
            }
        }
    }
    (flat, PlaceholderMap(map))
}

/// A marker found in flat text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocatedMarker {
    index: usize,
    start: usize,
    end: usize,
}

/// Scan text for markers whose index is present in `map`
fn locate_markers(text: &str, map: &PlaceholderMap) -> Vec<LocatedMarker> {
    let mut located = Vec::new();
    let mut search_start = 0;
    while let Some(pos) = text[search_start..].find("_PH") {
        let start = search_start + pos;
        let digits_start = start + 3;
        let digits_len = text[digits_start..]
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let digits_end = digits_start + digits_len;
        let closed = text[digits_end..].starts_with('_');
        let index = text[digits_start..digits_end].parse::<usize>().ok();
        match index {
            Some(index) if closed && map.get(index).is_some() => {
                located.push(LocatedMarker {
                    index,
                    start,
                    end: digits_end + 1,
                });
                search_start = digits_end + 1;
            }
            _ => search_start = start + 1,
        }
    }
    located
}

/// Turn translated flat text back into a normalized string
///
/// Markers may be reordered or repeated. Text that looks like a marker but
/// whose index is unknown stays literal. Missing markers are not an error
/// here: the result is simply not compatible with the source.
pub fn extract(flat: &str, map: &PlaceholderMap) -> NormalizedString {
    let mut nstr = NormalizedString::new();
    let mut last = 0;
    for located in locate_markers(flat, map) {
        nstr.push_text(&flat[last..located.start]);
        if let Some(part) = map.get(located.index) {
            nstr.push(part.clone());
        }
        last = located.end;
    }
    nstr.push_text(&flat[last..]);
    nstr
}

/// Consistency report for translated flat text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Marker indices absent from the translation
    pub missing: Vec<usize>,
    /// Whether markers appear in a different order than in the source
    pub reordering_detected: bool,
    pub warnings: Vec<String>,
}

impl RecoveryReport {
    pub fn all_markers_present(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Check translated flat text against the markers of its source.
///
/// Warning mode: reordering is reported but is legitimate (word order
/// changes between languages).
pub fn recover_report(flat: &str, map: &PlaceholderMap) -> RecoveryReport {
    let located = locate_markers(flat, map);
    let missing: Vec<usize> = map
        .indices()
        .filter(|i| !located.iter().any(|l| l.index == *i))
        .collect();

    // Markers are numbered in source order, so any decrease means reordering
    let mut first_seen = Vec::new();
    for l in &located {
        if !first_seen.contains(&l.index) {
            first_seen.push(l.index);
        }
    }
    let reordering_detected = first_seen.windows(2).any(|w| w[0] > w[1]);

    let mut warnings = Vec::new();
    if !missing.is_empty() {
        warnings.push(format!("Missing placeholder markers: {:?}", missing));
    }
    if reordering_detected {
        warnings.push(
            "Placeholder markers were reordered during translation, which may indicate word-order changes in the target language."
                .to_string(),
        );
    }
    RecoveryReport {
        missing,
        reordering_detected,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::DecoderSet;

    fn decode(raw: &str) -> NormalizedString {
        DecoderSet::from_names(&["xmlTag", "doubleBrace"])
            .unwrap()
            .decode(raw)
    }

    #[test]
    fn test_flatten_simple() {
        let (flat, map) = flatten(&decode("Hello {{name}}!"));
        assert_eq!(flat, "Hello _PH1_!");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(1), Some(&Part::placeholder("doubleBrace", "{{name}}")));
    }

    #[test]
    fn test_flatten_reuses_marker_for_same_value() {
        let (flat, map) = flatten(&decode("{{a}} told {{a}} about {{b}}"));
        assert_eq!(flat, "_PH1_ told _PH1_ about _PH2_");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_extract_round_trip() {
        let nsrc = decode("<b>{{count}}</b> new messages");
        let (flat, map) = flatten(&nsrc);
        assert_eq!(extract(&flat, &map), nsrc);
    }

    #[test]
    fn test_extract_reordered() {
        let nsrc = decode("{{sender}} sent {{item}}");
        let (_, map) = flatten(&nsrc);
        let ntgt = extract("_PH2_ は _PH1_ によって送信", &map);
        assert_eq!(ntgt.encode(), "{{item}} は {{sender}} によって送信");
        assert!(nsrc.is_compatible_with(&ntgt));
    }

    #[test]
    fn test_extract_unknown_marker_stays_literal() {
        let (_, map) = flatten(&decode("Hi {{name}}"));
        let ntgt = extract("Salut _PH1_ _PH7_ _PHx_", &map);
        assert_eq!(ntgt.encode(), "Salut {{name}} _PH7_ _PHx_");
        assert_eq!(ntgt.placeholders().count(), 1);
    }

    #[test]
    fn test_extract_consecutive_markers() {
        let nsrc = decode("<b></b>{{x}}");
        let (flat, map) = flatten(&nsrc);
        assert_eq!(flat, "_PH1__PH2__PH3_");
        assert_eq!(extract(&flat, &map), nsrc);
    }

    #[test]
    fn test_report_missing_marker() {
        let (_, map) = flatten(&decode("{{a}} and {{b}}"));
        let report = recover_report("_PH1_ only", &map);
        assert_eq!(report.missing, vec![2]);
        assert!(!report.all_markers_present());
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn test_report_reordering_is_warning_only() {
        let (_, map) = flatten(&decode("{{a}} and {{b}}"));
        let report = recover_report("_PH2_ et _PH1_", &map);
        assert!(report.all_markers_present());
        assert!(report.reordering_detected);

        let in_order = recover_report("_PH1_ et _PH2_", &map);
        assert!(!in_order.reordering_detected);
        assert!(in_order.warnings.is_empty());
    }

    #[test]
    fn test_flatten_without_placeholders() {
        let (flat, map) = flatten(&NormalizedString::from_raw("plain"));
        assert_eq!(flat, "plain");
        assert!(map.is_empty());
        assert_eq!(extract("simple", &map).encode(), "simple");
    }
}
