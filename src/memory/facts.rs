//! Case facts
//!
//! [`Fact`] is a ground atom in canonical form, [`FactSet`] the deduplicated,
//! order-free collection of them and [`FactStore`] the session-owned copy that
//! the conversation updates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::logic::term::{Term, TermParseError};

/// Predicate that carries the person identifier in its first argument.
pub const PERSON_PREDICATE: &str = "person_status";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactParseError {
    #[error("empty fact")]
    Empty,
    #[error(transparent)]
    Syntax(#[from] TermParseError),
    #[error("'{0}' is not an atom or compound term")]
    NotAtomic(String),
    #[error("'{0}' contains variables")]
    NotGround(String),
}

/// A ground logical atom: no trailing period, lowercase functor, canonical spacing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fact {
    text: String,
    functor: String,
    args: Vec<String>,
}

impl Fact {
    pub fn parse(input: &str) -> Result<Self, FactParseError> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed).trim();
        if trimmed.is_empty() {
            return Err(FactParseError::Empty);
        }

        let term = Term::parse(trimmed)?;
        if !term.is_ground() {
            return Err(FactParseError::NotGround(trimmed.to_string()));
        }
        let functor = match term.signature() {
            Some((name, _)) => name.to_string(),
            None => return Err(FactParseError::NotAtomic(trimmed.to_string())),
        };

        Ok(Self {
            text: term.to_string(),
            functor,
            args: term.args().iter().map(|a| a.to_string()).collect(),
        })
    }

    /// Instantiate a template such as `proceeding_status({person}, started)`.
    pub fn from_template(template: &str, person: &str) -> Result<Self, FactParseError> {
        Self::parse(&template.replace("{person}", person))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn functor(&self) -> &str {
        &self.functor
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl TryFrom<String> for Fact {
    type Error = FactParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Fact::parse(&value)
    }
}

impl From<Fact> for String {
    fn from(fact: Fact) -> Self {
        fact.text
    }
}

/// Set of facts; iteration is always in canonical (sorted) order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactSet(BTreeSet<Fact>);

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fact: Fact) -> bool {
        self.0.insert(fact)
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.0.contains(fact)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.0.iter()
    }

    pub fn union(&self, other: &FactSet) -> FactSet {
        self.0.union(&other.0).cloned().collect()
    }

    pub fn difference(&self, other: &FactSet) -> FactSet {
        self.0.difference(&other.0).cloned().collect()
    }

    pub fn is_subset(&self, other: &FactSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Canonical lines in sorted order; input of the cache digest.
    pub fn canonical_lines(&self) -> Vec<&str> {
        self.0.iter().map(Fact::as_str).collect()
    }

    /// The person the case is about.
    ///
    /// Candidates are the subjects of `person_status/2`. A case describes one
    /// person, so when several appear the one that is the subject of the most
    /// facts wins; ties go to the first in canonical order.
    pub fn person_id(&self) -> Option<String> {
        let candidates: BTreeSet<&str> = self
            .0
            .iter()
            .filter(|f| f.functor() == PERSON_PREDICATE && f.arity() >= 2)
            .filter_map(|f| f.arg(0))
            .collect();

        let mut best: Option<(&str, usize)> = None;
        for candidate in candidates {
            let mentions = self.0.iter().filter(|f| f.arg(0) == Some(candidate)).count();
            if best.map_or(true, |(_, most)| mentions > most) {
                best = Some((candidate, mentions));
            }
        }
        best.map(|(id, _)| id.to_string())
    }
}

impl FromIterator<Fact> for FactSet {
    fn from_iter<I: IntoIterator<Item = Fact>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Fact> for FactSet {
    fn extend<I: IntoIterator<Item = Fact>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl IntoIterator for FactSet {
    type Item = Fact;
    type IntoIter = std::collections::btree_set::IntoIter<Fact>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FactSet {
    type Item = &'a Fact;
    type IntoIter = std::collections::btree_set::Iter<'a, Fact>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The session's current case description.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    facts: FactSet,
    person_id: Option<String>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facts(&self) -> &FactSet {
        &self.facts
    }

    pub fn person_id(&self) -> Option<&str> {
        self.person_id.as_deref()
    }

    /// Replace the current facts with a freshly extracted description.
    ///
    /// Returns `false` and leaves the store untouched when the extracted set
    /// equals the current one, which tells the caller to skip recomputation.
    pub fn merge(&mut self, extracted: FactSet) -> bool {
        if extracted == self.facts {
            debug!("Extracted facts unchanged ({} facts)", extracted.len());
            return false;
        }

        if self.person_id.is_none() {
            if let Some(id) = extracted.person_id() {
                info!("Person id fixed for session: {}", id);
                self.person_id = Some(id);
            }
        }

        info!("Fact store updated: {} -> {} facts", self.facts.len(), extracted.len());
        self.facts = extracted;
        true
    }

    pub fn clear(&mut self) {
        self.facts = FactSet::new();
        self.person_id = None;
    }
}
