//! Explanation trees
//!
//! Turns the raw derivation returned by `explain/2` (nested JSON arrays of
//! term strings) into a typed [`ExplanationTree`]: bookkeeping terms are
//! stripped, variables anonymized and every leaf classified against the
//! case facts.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;

use crate::memory::facts::{Fact, FactSet};

lazy_static! {
    static ref VARIABLE_PATTERN: Regex = Regex::new(r"Variable\(\d+\)").unwrap();
    static ref FRESH_VARIABLE_PATTERN: Regex = Regex::new(r"\b_G?\d+\b").unwrap();
}

const SYSTEM_PREDICATE: &str = "system_predicate";
const BOOKKEEPING_PREFIXES: [&str; 2] = ["auxiliary_right_scope", "right_property_scope"];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "term", rename_all = "snake_case")]
pub enum Leaf {
    /// A case fact the derivation used.
    Fact(Fact),
    /// A fact the derivation assumed under abduction.
    Abduced(Fact),
    /// Anything else: rule heads, builtins, non-ground goals.
    Opaque(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationTree {
    Leaf(Leaf),
    Node(Vec<ExplanationTree>),
}

impl ExplanationTree {
    /// Clean and classify a raw derivation.
    pub fn process(raw: &Value, facts: &FactSet) -> Self {
        clean(raw, facts).unwrap_or(ExplanationTree::Node(Vec::new()))
    }

    pub fn facts_used(&self) -> FactSet {
        let mut out = FactSet::new();
        self.collect(&mut |leaf: &Leaf| {
            if let Leaf::Fact(fact) = leaf {
                out.insert(fact.clone());
            }
        });
        out
    }

    pub fn abduced_facts(&self) -> FactSet {
        let mut out = FactSet::new();
        self.collect(&mut |leaf: &Leaf| {
            if let Leaf::Abduced(fact) = leaf {
                out.insert(fact.clone());
            }
        });
        out
    }

    fn collect(&self, visit: &mut impl FnMut(&Leaf)) {
        match self {
            ExplanationTree::Leaf(leaf) => visit(leaf),
            ExplanationTree::Node(children) => {
                for child in children {
                    child.collect(visit);
                }
            }
        }
    }

    /// Indented plain-text rendering for prompts and logs.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        match self {
            ExplanationTree::Leaf(leaf) => {
                let indent = "  ".repeat(depth);
                let _ = match leaf {
                    Leaf::Fact(fact) => writeln!(out, "{}- {}", indent, fact),
                    Leaf::Abduced(fact) => writeln!(out, "{}- {} (assumed)", indent, fact),
                    Leaf::Opaque(text) => writeln!(out, "{}- {}", indent, text),
                };
            }
            ExplanationTree::Node(children) => {
                for (i, child) in children.iter().enumerate() {
                    // The first element of a nested node is the goal it proves.
                    let depth = if i == 0 || depth == 0 { depth } else { depth + 1 };
                    child.render_into(out, depth);
                }
            }
        }
    }
}

fn clean(raw: &Value, facts: &FactSet) -> Option<ExplanationTree> {
    match raw {
        Value::Array(items) => {
            let children: Vec<ExplanationTree> = items.iter().filter_map(|v| clean(v, facts)).collect();
            if children.is_empty() {
                None
            } else {
                Some(ExplanationTree::Node(children))
            }
        }
        Value::String(text) => clean_term(text).map(|t| ExplanationTree::Leaf(classify(t, facts))),
        Value::Null => None,
        other => Some(ExplanationTree::Leaf(Leaf::Opaque(other.to_string()))),
    }
}

fn clean_term(text: &str) -> Option<String> {
    let text = VARIABLE_PATTERN.replace_all(text.trim(), "_");
    let text = FRESH_VARIABLE_PATTERN.replace_all(&text, "_");
    let text = unwrap_user(&text).to_string();

    if text.is_empty() || is_bookkeeping(&text) {
        return None;
    }
    Some(text)
}

fn is_bookkeeping(text: &str) -> bool {
    text == SYSTEM_PREDICATE || BOOKKEEPING_PREFIXES.iter().any(|p| text.starts_with(p))
}

/// `:(user, X)` and `user:X` both become `X`.
fn unwrap_user(text: &str) -> &str {
    if let Some(inner) = text
        .strip_prefix(":(user,")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return inner.trim();
    }
    if let Some(inner) = text.strip_prefix("user:") {
        return inner.trim();
    }
    text
}

fn classify(text: String, facts: &FactSet) -> Leaf {
    if let Some(inner) = text
        .strip_prefix("abduced(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        if let Ok(fact) = Fact::parse(inner) {
            return Leaf::Abduced(fact);
        }
    }
    match Fact::parse(&text) {
        Ok(fact) if facts.contains(&fact) => Leaf::Fact(fact),
        _ => Leaf::Opaque(text),
    }
}
