//! Resource filters
//!
//! A filter turns the raw text of a resource into segments, and regenerates a
//! resource from a source one by substituting translated strings.

pub mod json;

pub use json::{JsonFilter, JsonFilterOptions};

use crate::error::L10nResult;
use serde::{Deserialize, Serialize};

/// One translatable string inside a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub sid: String,
    pub str: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_suffix_pluralized: bool,
}

impl Segment {
    pub fn new(sid: impl Into<String>, str: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            str: str.into(),
            notes: None,
            is_suffix_pluralized: false,
        }
    }
}

/// A malformed or unexpected annotation; the segment itself is still emitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationIssue {
    pub sid: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResource {
    pub segments: Vec<Segment>,
    pub annotation_issues: Vec<AnnotationIssue>,
}

impl ParsedResource {
    pub fn segment(&self, sid: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.sid == sid)
    }
}

/// Callback used by [`ResourceFilter::translate_resource`]: receives the
/// segment id and the source string, returns the translation or `None` to
/// drop the entry from the generated resource.
pub type Translator<'a> = dyn FnMut(&str, &str) -> Option<String> + 'a;

pub trait ResourceFilter: Send + Sync + std::fmt::Debug {
    fn parse_resource(&self, resource: &str) -> L10nResult<ParsedResource>;

    fn translate_resource(&self, resource: &str, translator: &mut Translator<'_>) -> L10nResult<String>;
}
