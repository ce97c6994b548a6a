//! Logic engine contract
//!
//! The symbolic engine keeps one mutable knowledge base per module. A query
//! asserts the case facts into the module, solves `explain/2` over
//! `has_right/5` and retracts the facts again. [`AssertedScope`] owns the
//! retraction so it happens on every exit path.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::EngineError;
use crate::logic::term::quote_atom;
use crate::memory::facts::Fact;

/// Sentinel fact that switches the knowledge base into abductive mode.
pub const ABDUCTION_SENTINEL: &str = "abd_enabled";

/// A `has_right(Right, Law, Art, Person, Opt)` goal. `None` leaves the
/// argument unbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal {
    pub right: Option<String>,
    pub law: String,
    pub person: Option<String>,
    pub option: Option<String>,
}

impl Goal {
    pub fn has_right(law: impl Into<String>) -> Self {
        Self {
            right: None,
            law: law.into(),
            person: None,
            option: None,
        }
    }

    pub fn for_person(mut self, person: Option<&str>) -> Self {
        self.person = person.map(str::to_string);
        self
    }

    pub fn restricted_to(mut self, right: Option<&str>, option: Option<&str>) -> Self {
        self.right = right.map(str::to_string);
        self.option = option.map(str::to_string);
        self
    }

    /// The goal in engine syntax, e.g. `has_right(Right, dir, Art, p, Opt)`.
    pub fn render(&self) -> String {
        format!(
            "has_right({}, {}, Art, {}, {})",
            bound_or(self.right.as_deref(), "Right"),
            quote_atom(&self.law),
            bound_or(self.person.as_deref(), "Person"),
            bound_or(self.option.as_deref(), "Opt"),
        )
    }
}

fn bound_or(value: Option<&str>, variable: &str) -> String {
    value.map(quote_atom).unwrap_or_else(|| variable.to_string())
}

/// One solution of a goal: the bindings plus the raw derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub article: String,
    pub right: String,
    pub option: String,
    /// Nested arrays of term strings as produced by `explain/2`.
    pub explanation: serde_json::Value,
}

/// Title, body and editorial note of an article, as annotated in the
/// module source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArticleText {
    pub title: String,
    pub text: String,
    pub comment: Option<String>,
}

/// A symbolic engine with per-module knowledge bases.
///
/// Implementations are blocking and must be called off the async workers.
/// Callers serialize access per module.
pub trait LogicEngine: Send + Sync {
    fn assert_fact(&self, module: &str, fact: &Fact) -> Result<(), EngineError>;

    /// Remove every clause equal to `fact`. Removing an absent fact is not an error.
    fn retract_fact(&self, module: &str, fact: &Fact) -> Result<(), EngineError>;

    fn solve(&self, module: &str, goal: &Goal) -> Result<Vec<Solution>, EngineError>;

    /// Text of the article granting `right` in `module`. Engines without
    /// annotated sources have none.
    fn article_text(&self, _module: &str, _right: &str, _article: &str) -> Result<Option<ArticleText>, EngineError> {
        Ok(None)
    }
}

/// Facts asserted into one module, retracted when the scope is dropped.
pub struct AssertedScope<'a> {
    engine: &'a dyn LogicEngine,
    module: &'a str,
    asserted: Vec<&'a Fact>,
}

impl<'a> AssertedScope<'a> {
    /// Assert every fact. If one assert fails, the ones already asserted are
    /// retracted before the error is returned.
    pub fn assert_all(
        engine: &'a dyn LogicEngine,
        module: &'a str,
        facts: impl IntoIterator<Item = &'a Fact>,
    ) -> Result<Self, EngineError> {
        let mut scope = Self {
            engine,
            module,
            asserted: Vec::new(),
        };
        for fact in facts {
            scope.engine.assert_fact(module, fact)?;
            scope.asserted.push(fact);
        }
        Ok(scope)
    }

    pub fn solve(&self, goal: &Goal) -> Result<Vec<Solution>, EngineError> {
        self.engine.solve(self.module, goal)
    }

    pub fn len(&self) -> usize {
        self.asserted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.asserted.is_empty()
    }
}

impl Drop for AssertedScope<'_> {
    fn drop(&mut self) {
        for fact in self.asserted.drain(..).rev() {
            if let Err(e) = self.engine.retract_fact(self.module, fact) {
                error!("Failed to retract {} from {}: {}", fact, self.module, e);
            }
        }
    }
}
