//! Derived rights
//!
//! [`RightRecord`] is one derivation of `has_right/5` in one module, with its
//! processed explanation. [`RightsIndex`] groups records by right name in a
//! deterministic order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::logic::engine::ArticleText;
use crate::logic::explanation::ExplanationTree;
use crate::memory::facts::FactSet;

/// Label of the reference (EU) level in records and theories.
pub const DIRECTIVE_LABEL: &str = "directive";

/// Where a right is derived: the directive itself or one national implementation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Jurisdiction {
    Directive,
    National(String),
}

impl Jurisdiction {
    pub fn national(country: impl Into<String>) -> Self {
        Jurisdiction::National(country.into())
    }

    /// Value of the `Law` argument of `has_right/5`.
    pub fn law(&self) -> &str {
        match self {
            Jurisdiction::Directive => "dir",
            Jurisdiction::National(code) => code,
        }
    }

    /// `directive` or the country code.
    pub fn label(&self) -> &str {
        match self {
            Jurisdiction::Directive => DIRECTIVE_LABEL,
            Jurisdiction::National(code) => code,
        }
    }

    /// Engine module holding this jurisdiction's rules for `directive`.
    pub fn module(&self, directive: &str) -> String {
        match self {
            Jurisdiction::Directive => directive.to_string(),
            Jurisdiction::National(code) => format!("{}_{}", directive, code),
        }
    }

    pub fn is_directive(&self) -> bool {
        matches!(self, Jurisdiction::Directive)
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<Jurisdiction> for String {
    fn from(j: Jurisdiction) -> Self {
        j.label().to_string()
    }
}

impl From<String> for Jurisdiction {
    fn from(label: String) -> Self {
        if label == DIRECTIVE_LABEL || label == "dir" {
            Jurisdiction::Directive
        } else {
            Jurisdiction::National(label)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RightRecord {
    pub right: String,
    pub jurisdiction: Jurisdiction,
    pub module: String,
    pub article: String,
    pub option: String,
    pub explanation: ExplanationTree,
    pub facts_used: FactSet,
    pub abduced_facts: FactSet,
    #[serde(default)]
    pub article_text: Option<ArticleText>,
}

impl RightRecord {
    /// `article - right - option`, as listed to the user.
    pub fn overview_line(&self) -> String {
        format!("{} - {} - {}", self.article, self.right, self.option)
    }

    /// Facts the derivation depends on, abduced ones included.
    pub fn premises(&self) -> FactSet {
        self.facts_used.union(&self.abduced_facts)
    }

    pub fn is_abduced(&self) -> bool {
        !self.abduced_facts.is_empty()
    }

    pub fn matches(&self, right: &str, option: &str) -> bool {
        self.right == right && self.option == option
    }
}

/// Right name to its records. Records are deduplicated and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightsIndex {
    rights: BTreeMap<String, Vec<RightRecord>>,
}

impl RightsIndex {
    pub fn from_records(records: impl IntoIterator<Item = RightRecord>) -> Self {
        let unique: BTreeSet<RightRecord> = records.into_iter().collect();
        let mut rights: BTreeMap<String, Vec<RightRecord>> = BTreeMap::new();
        for record in unique {
            rights.entry(record.right.clone()).or_default().push(record);
        }
        Self { rights }
    }

    pub fn is_empty(&self) -> bool {
        self.rights.is_empty()
    }

    /// Number of records across all rights.
    pub fn len(&self) -> usize {
        self.rights.values().map(Vec::len).sum()
    }

    pub fn right_names(&self) -> impl Iterator<Item = &str> {
        self.rights.keys().map(String::as_str)
    }

    pub fn records_for(&self, right: &str) -> &[RightRecord] {
        self.rights.get(right).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn records(&self) -> impl Iterator<Item = &RightRecord> {
        self.rights.values().flatten()
    }

    /// Records for exactly this (right, option).
    pub fn filter_target(&self, right: &str, option: &str) -> Vec<&RightRecord> {
        self.records_for(right)
            .iter()
            .filter(|r| r.option == option)
            .collect()
    }

    /// Records for the same right under any other option.
    pub fn filter_other_options(&self, right: &str, option: &str) -> Vec<&RightRecord> {
        self.records_for(right)
            .iter()
            .filter(|r| r.option != option)
            .collect()
    }

    pub fn contains_target(&self, right: &str, option: &str) -> bool {
        self.records_for(right).iter().any(|r| r.option == option)
    }

    /// Distinct overview lines in index order.
    pub fn overview_lines(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.records()
            .map(RightRecord::overview_line)
            .filter(|line| seen.insert(line.clone()))
            .collect()
    }

    pub fn abduced_facts(&self) -> FactSet {
        self.records()
            .flat_map(|r| r.abduced_facts.iter().cloned())
            .collect()
    }
}
