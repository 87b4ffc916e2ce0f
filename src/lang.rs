//! Language tag helpers
//!
//! Language codes flow through configuration, job requests and store keys;
//! they are validated once with ICU and compared as given afterwards.

use crate::error::{L10nError, L10nResult};
use icu_locale::Locale;
use icu_plurals::{PluralCategory, PluralRuleType, PluralRules};

/// Validate that a language tag is well-formed BCP 47
///
/// # Example
/// ```ignore
/// validate_language("en")?; // OK
/// validate_language("pt-BR")?; // OK
/// validate_language("not a tag").unwrap_err(); // Error
/// ```
pub fn validate_language(tag: &str) -> L10nResult<()> {
    if tag.trim().is_empty() {
        return Err(L10nError::Configuration(
            "Language tag is empty".to_string(),
        ));
    }
    tag.parse::<Locale>().map(|_| ()).map_err(|e| {
        L10nError::Configuration(format!("Invalid language tag '{}': {}", tag, e))
    })
}

/// Strip region and script information: `en-US` → `en`, `zh-Hans` → `zh`
pub fn normalize_locale(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_lowercase()
}

/// CLDR cardinal plural categories used by a language, as suffix strings
/// (`zero`, `one`, `two`, `few`, `many`, `other`).
///
/// Unknown or unparseable languages fall back to `one` and `other`.
pub fn plural_categories(lang: &str) -> Vec<&'static str> {
    let fallback = vec!["one", "other"];
    let Ok(locale) = lang.parse::<Locale>() else {
        return fallback;
    };
    let Ok(rules) = PluralRules::try_new(locale.into(), PluralRuleType::Cardinal.into()) else {
        return fallback;
    };

    // Sample values chosen to hit every category in the languages CLDR covers
    let samples: [(PluralCategory, &'static str, &[usize]); 6] = [
        (PluralCategory::Zero, "zero", &[0]),
        (PluralCategory::One, "one", &[1, 21, 31]),
        (PluralCategory::Two, "two", &[2, 22]),
        (PluralCategory::Few, "few", &[3, 4, 23]),
        (PluralCategory::Many, "many", &[5, 11, 101, 1_000_000]),
        (PluralCategory::Other, "other", &[6, 10, 100, 1000]),
    ];
    let mut categories = Vec::new();
    for (category, name, values) in samples {
        if values.iter().any(|v| rules.category_for(*v) == category) {
            categories.push(name);
        }
    }
    if !categories.contains(&"other") {
        categories.push("other");
    }
    categories
}

/// Plural suffix of a key, if it ends with `_<category>`
pub fn plural_suffix(sid: &str) -> Option<&str> {
    let (_, suffix) = sid.rsplit_once('_')?;
    matches!(suffix, "zero" | "one" | "two" | "few" | "many" | "other").then_some(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_language() {
        assert!(validate_language("en").is_ok());
        assert!(validate_language("pt-BR").is_ok());
        assert!(validate_language("zh-Hans").is_ok());
        assert!(validate_language("").is_err());
        assert!(validate_language("en@invalid").is_err());
    }

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("en-US"), "en");
        assert_eq!(normalize_locale("zh-Hans"), "zh");
        assert_eq!(normalize_locale("de_DE"), "de");
        assert_eq!(normalize_locale("FR"), "fr");
    }

    #[test]
    fn test_plural_categories_english() {
        assert_eq!(plural_categories("en"), vec!["one", "other"]);
    }

    #[test]
    fn test_plural_categories_russian() {
        let categories = plural_categories("ru");
        assert!(categories.contains(&"one"));
        assert!(categories.contains(&"few"));
        assert!(categories.contains(&"many"));
        assert!(!categories.contains(&"two"));
    }

    #[test]
    fn test_plural_categories_japanese_has_only_other() {
        assert_eq!(plural_categories("ja"), vec!["other"]);
    }

    #[test]
    fn test_plural_suffix() {
        assert_eq!(plural_suffix("items_one"), Some("one"));
        assert_eq!(plural_suffix("deep.items_other"), Some("other"));
        assert_eq!(plural_suffix("user_name"), None);
        assert_eq!(plural_suffix("plain"), None);
    }
}
