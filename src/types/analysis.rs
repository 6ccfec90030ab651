//! Analysis request and result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Options that shape an analysis and take part in its cache fingerprint.
///
/// `rules` is a set, so the order rules were supplied in never produces a
/// different fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    pub language: String,
    #[serde(default)]
    pub rules: BTreeSet<String>,
}

impl AnalysisOptions {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            rules: BTreeSet::new(),
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rules.insert(rule.into());
        self
    }

    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.extend(rules.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub content: String,
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    pub fn new(content: impl Into<String>, options: AnalysisOptions) -> Self {
        Self {
            content: content.into(),
            options,
        }
    }
}

/// Structured findings returned by the backend.
///
/// The entries are opaque JSON; equality is by value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub issues: Vec<Value>,
    pub suggestions: Vec<Value>,
    pub metrics: Map<String, Value>,
}

impl AnalysisResult {
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}
