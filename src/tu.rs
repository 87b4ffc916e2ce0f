//! Translation Units and content addressing
//!
//! A translation unit (TU) identifies one translatable segment. Its GUID is a
//! pure function of `(rid, sid, normalized source, notes)`: it changes if and
//! only if the translatable content or the translator guidance changes, and it
//! never depends on wall-clock time or insertion order.

use crate::filter::Segment;
use crate::normalize::{DecoderSet, NormalizedString, ParseIssue};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compute the GUID of a translatable unit
///
/// The canonical serialization is the JSON array `[rid, sid, parts, notes]`,
/// hashed with SHA-256 and encoded as unpadded base64url.
///
/// # Example
/// ```ignore
/// let a = guid("a.json", "greeting", &"Hello".into(), None);
/// let b = guid("a.json", "greeting", &"Hello".into(), None);
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 43);
/// ```
pub fn guid(rid: &str, sid: &str, content: &NormalizedString, notes: Option<&str>) -> String {
    let canonical = serde_json::json!([rid, sid, content, notes]).to_string();
    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}

/// One translatable segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationUnit {
    pub guid: String,
    pub rid: String,
    pub sid: String,
    /// Raw source, when it has no placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Normalized source, when decoding found placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsrc: Option<NormalizedString>,
    /// Translator guidance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_suffix_pluralized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
}

impl TranslationUnit {
    pub fn new(rid: &str, sid: &str, source: NormalizedString, notes: Option<String>) -> Self {
        let guid = guid(rid, sid, &source, notes.as_deref());
        let (src, nsrc) = if source.has_placeholders() {
            (None, Some(source))
        } else {
            (Some(source.encode()), None)
        };
        Self {
            guid,
            rid: rid.to_string(),
            sid: sid.to_string(),
            src,
            nsrc,
            notes,
            is_suffix_pluralized: false,
            ts: None,
        }
    }

    /// Build a TU from a parsed resource segment, decoding its string
    pub fn from_segment(
        rid: &str,
        segment: &Segment,
        decoders: &DecoderSet,
    ) -> (Self, Vec<ParseIssue>) {
        let decoded = decoders.decode_with_issues(&segment.str);
        let mut tu = Self::new(rid, &segment.sid, decoded.nstr, segment.notes.clone());
        tu.is_suffix_pluralized = segment.is_suffix_pluralized;
        (tu, decoded.issues)
    }

    pub fn with_ts(mut self, ts: Option<DateTime<Utc>>) -> Self {
        self.ts = ts;
        self
    }

    /// The source in normalized form, whichever way it is stored
    pub fn source(&self) -> NormalizedString {
        match (&self.nsrc, &self.src) {
            (Some(nsrc), _) => nsrc.clone(),
            (None, Some(src)) => NormalizedString::from_raw(src),
            (None, None) => NormalizedString::new(),
        }
    }

    pub fn raw_source(&self) -> String {
        self.source().encode()
    }

    /// Recompute the GUID from the TU's own fields
    pub fn computed_guid(&self) -> String {
        guid(&self.rid, &self.sid, &self.source(), self.notes.as_deref())
    }
}
