#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rights_agency::agent::LLMProvider;
use rights_agency::argumentation::ArgumentationEvaluator;
use rights_agency::error::{ArgumentationError, EngineError};
use rights_agency::logic::{Goal, LogicEngine, Solution, ABDUCTION_SENTINEL};
use rights_agency::memory::{Fact, FactSet};

pub const DIRECTIVE: &str = "directive_2010_64";
pub const RIGHT: &str = "right_to_interpretation";
pub const OPTION: &str = "questioning";
pub const ARTICLE: &str = "art2";

pub fn fact(text: &str) -> Fact {
    Fact::parse(text).unwrap()
}

pub fn facts(items: &[&str]) -> FactSet {
    items.iter().map(|s| fact(s)).collect()
}

/// The case of the worked example.
pub fn case_facts() -> FactSet {
    facts(&["person_status(p, suspect)", "proceeding_type(p, europeanArrestWarrant)"])
}

/// A rule of the fake knowledge base: the right holds when every required
/// fact is asserted, or abduction is on and the missing ones are abducible.
#[derive(Debug, Clone)]
pub struct Rule {
    pub article: String,
    pub right: String,
    pub option: String,
    pub requires: Vec<Fact>,
    pub abducible: Vec<Fact>,
}

impl Rule {
    pub fn new(article: &str, right: &str, option: &str, requires: &[&str]) -> Self {
        Self {
            article: article.to_string(),
            right: right.to_string(),
            option: option.to_string(),
            requires: requires.iter().map(|s| fact(s)).collect(),
            abducible: Vec::new(),
        }
    }

    pub fn abducible(mut self, items: &[&str]) -> Self {
        for item in items {
            let f = fact(item);
            self.requires.push(f.clone());
            self.abducible.push(f);
        }
        self
    }
}

/// In-memory logic engine with per-module rules.
#[derive(Default)]
pub struct RuleEngine {
    rules: HashMap<String, Vec<Rule>>,
    kb: Mutex<HashMap<String, Vec<Fact>>>,
    pub solves: AtomicUsize,
    failures: AtomicUsize,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, module: &str, rule: Rule) -> Self {
        self.rules.entry(module.to_string()).or_default().push(rule);
        self
    }

    pub fn solve_count(&self) -> usize {
        self.solves.load(Ordering::SeqCst)
    }

    /// Make the next `n` solves fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn asserted(&self, module: &str) -> usize {
        self.kb.lock().unwrap().get(module).map_or(0, Vec::len)
    }
}

impl LogicEngine for RuleEngine {
    fn assert_fact(&self, module: &str, fact: &Fact) -> Result<(), EngineError> {
        self.kb.lock().unwrap().entry(module.to_string()).or_default().push(fact.clone());
        Ok(())
    }

    fn retract_fact(&self, module: &str, fact: &Fact) -> Result<(), EngineError> {
        let mut kb = self.kb.lock().unwrap();
        let entries = kb.entry(module.to_string()).or_default();
        if let Some(pos) = entries.iter().position(|f| f == fact) {
            entries.remove(pos);
        }
        Ok(())
    }

    fn solve(&self, module: &str, goal: &Goal) -> Result<Vec<Solution>, EngineError> {
        self.solves.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failures) {
            return Err(EngineError::Query {
                module: module.to_string(),
                reason: "procedure explain/2 does not exist".to_string(),
            });
        }
        let kb = self.kb.lock().unwrap();
        let asserted = kb.get(module).cloned().unwrap_or_default();
        let abduce = asserted.iter().any(|f| f.as_str() == ABDUCTION_SENTINEL);

        let mut solutions = Vec::new();
        for rule in self.rules.get(module).into_iter().flatten() {
            if goal.right.as_deref().is_some_and(|r| r != rule.right)
                || goal.option.as_deref().is_some_and(|o| o != rule.option)
            {
                continue;
            }

            let mut leaves: Vec<Value> = Vec::new();
            let mut holds = true;
            for required in &rule.requires {
                if asserted.contains(required) {
                    leaves.push(json!([required.as_str()]));
                } else if abduce && rule.abducible.contains(required) {
                    leaves.push(json!([format!("abduced({})", required)]));
                } else {
                    holds = false;
                    break;
                }
            }
            if !holds {
                continue;
            }

            let head = format!(
                "has_right({}, {}, {}, {}, {})",
                rule.right,
                goal.law,
                rule.article,
                goal.person.as_deref().unwrap_or("_G12"),
                rule.option
            );
            let mut explanation = vec![json!(head), json!(["system_predicate"])];
            explanation.extend(leaves);
            solutions.push(Solution {
                article: rule.article.clone(),
                right: rule.right.clone(),
                option: rule.option.clone(),
                explanation: Value::Array(explanation),
            });
        }
        Ok(solutions)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

lazy_static! {
    static ref CASE_RULE: Regex =
        Regex::new(r"^\w+ :[-=]> right\(([^,]+), ([^,]+), ([^,]+), ([^,]+), \[(.*)\]\)\.$").unwrap();
    static ref TARGETS: Regex = Regex::new(r"member\(Y, \[([^\]]*)\]\)").unwrap();
}

/// Reproduces the grounded extension of the conformity theory: strict
/// conformity defeats partial conformity; the negated conclusion holds
/// whenever no national rule shares the directive's premises.
#[derive(Default)]
pub struct GroundedMock {
    /// Theories evaluated successfully.
    pub theories: Mutex<Vec<String>>,
    failures: AtomicUsize,
}

impl GroundedMock {
    /// An evaluator whose first `n` calls time out.
    pub fn failing(n: usize) -> Self {
        Self {
            theories: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(n),
        }
    }
}

#[async_trait]
impl ArgumentationEvaluator for GroundedMock {
    async fn evaluate(&self, theory: &str) -> Result<String, ArgumentationError> {
        if take_one(&self.failures) {
            return Err(ArgumentationError::Timeout(60));
        }
        self.theories.lock().unwrap().push(theory.to_string());

        let targets: Vec<String> = TARGETS
            .captures(theory)
            .map(|c| c[1].split(',').map(|t| t.trim().to_string()).collect())
            .unwrap_or_default();
        let rules: Vec<[String; 5]> = theory
            .lines()
            .filter_map(|line| CASE_RULE.captures(line.trim()))
            .map(|c| [1, 2, 3, 4, 5].map(|i| c[i].to_string()))
            .collect();

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for [_, article, right, option, premises] in rules.iter().filter(|r| r[0] == "directive") {
            for target in &targets {
                let national: Vec<&[String; 5]> = rules
                    .iter()
                    .filter(|r| &r[0] == target && &r[2] == right && &r[3] == option)
                    .collect();
                let exact = national.iter().any(|r| &r[4] == premises);
                let differs = national.iter().any(|r| &r[4] != premises);

                if exact {
                    accepted.push(format!("conformity({}, {})", target, article));
                    if differs {
                        rejected.push(format!("partialConformity({}, {})", target, article));
                    }
                } else {
                    accepted.push(format!("'-'(conformity({}, {}))", target, article));
                    if differs {
                        accepted.push(format!("partialConformity({}, {})", target, article));
                    }
                }
            }
        }

        Ok(format!("IN\n{}\nOUT\n{}\nUND\n", accepted.join("\n"), rejected.join("\n")))
    }
}

/// Chat model stand-in that answers by prompt kind.
pub struct ScriptedProvider {
    intents: Mutex<VecDeque<String>>,
    extractions: Mutex<VecDeque<String>>,
    pub narrator_systems: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(intents: &[&str], extractions: &[&str]) -> Self {
        Self {
            intents: Mutex::new(intents.iter().map(|s| s.to_string()).collect()),
            extractions: Mutex::new(extractions.iter().map(|s| s.to_string()).collect()),
            narrator_systems: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, _model: &str, prompt: String, system: Option<String>) -> Result<String> {
        if prompt.contains("what does the user want to do") {
            return Ok(self.intents.lock().unwrap().pop_front().unwrap_or_else(|| "0".to_string()));
        }
        if prompt.contains("extracting relevant Prolog facts") {
            return Ok(self
                .extractions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "```\n```".to_string()));
        }
        self.narrator_systems.lock().unwrap().push(system.unwrap_or_default());
        Ok("Here is what I found.".to_string())
    }
}
