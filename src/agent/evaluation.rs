//! Extraction evaluation
//!
//! Scores the fact extractor against hand-written cases. A case file is named
//! `directive@country@person.txt` and holds the reference facts between
//! `FACTS` and `FACTS_END` and one scenario per line between `TEST` and
//! `TEST_END` (optionally numbered `1. ...`).

use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Add;
use std::path::Path;
use tracing::{info, warn};

use crate::agent::extractor::FactExtractor;
use crate::memory::facts::{Fact, FactSet};

lazy_static! {
    static ref FACTS_SECTION: Regex = Regex::new(r"(?s)FACTS\n(.*?)\nFACTS_END").unwrap();
    static ref TEST_SECTION: Regex = Regex::new(r"(?s)TEST\n(.*?)\nTEST_END").unwrap();
    static ref NUMBERING: Regex = Regex::new(r"^\d+\.\s*").unwrap();
}

/// Placeholder replacing the person argument when comparing across cases.
pub const PERSON_PLACEHOLDER: &str = "pid";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationCase {
    pub name: String,
    pub directive: String,
    pub country: String,
    pub person_id: String,
    pub facts: FactSet,
    pub scenarios: Vec<String>,
}

impl EvaluationCase {
    pub fn parse(file_name: &str, text: &str) -> Result<Self> {
        let stem = file_name.strip_suffix(".txt").unwrap_or(file_name);
        let parts: Vec<&str> = stem.split('@').collect();
        let [directive, country, person_id] = parts[..] else {
            bail!("case file name '{}' is not directive@country@person.txt", file_name);
        };

        let facts = match FACTS_SECTION.captures(text) {
            Some(caps) => caps[1]
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| Fact::parse(l).with_context(|| format!("bad reference fact '{}' in {}", l, file_name)))
                .collect::<Result<FactSet>>()?,
            None => FactSet::new(),
        };

        let scenarios = match TEST_SECTION.captures(text) {
            Some(caps) => caps[1]
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| NUMBERING.replace(l, "").into_owned())
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            name: file_name.to_string(),
            directive: directive.to_string(),
            country: country.to_string(),
            person_id: person_id.to_string(),
            facts,
            scenarios,
        })
    }

    /// Scenarios actually run: two for single-fact cases, ten otherwise.
    pub fn samples(&self) -> &[String] {
        let n = if self.facts.len() == 1 { 2 } else { 10 };
        &self.scenarios[..n.min(self.scenarios.len())]
    }

    pub fn is_single(&self) -> bool {
        self.facts.len() == 1
    }
}

/// Every `*.txt` case under `dir`, sorted by file name.
pub fn load_cases(dir: &Path) -> Result<Vec<EvaluationCase>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("cannot read dataset {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".txt") {
            names.push(name);
        }
    }
    names.sort();

    names
        .iter()
        .map(|name| {
            let text = std::fs::read_to_string(dir.join(name)).with_context(|| format!("cannot read {}", name))?;
            EvaluationCase::parse(name, &text)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl Counts {
    pub fn compare(extracted: &FactSet, reference: &FactSet) -> Self {
        let hits = extracted.iter().filter(|f| reference.contains(f)).count();
        Self {
            true_positives: hits,
            false_positives: extracted.len() - hits,
            false_negatives: reference.len() - hits,
        }
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(self, other: Counts) -> Counts {
        Counts {
            true_positives: self.true_positives + other.true_positives,
            false_positives: self.false_positives + other.false_positives,
            false_negatives: self.false_negatives + other.false_negatives,
        }
    }
}

impl std::iter::Sum for Counts {
    fn sum<I: Iterator<Item = Counts>>(iter: I) -> Counts {
        iter.fold(Counts::default(), Add::add)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(flatten)]
    pub counts: Counts,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub f2: f64,
}

impl From<Counts> for Metrics {
    fn from(counts: Counts) -> Self {
        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let precision = ratio(counts.true_positives, counts.true_positives + counts.false_positives);
        let recall = ratio(counts.true_positives, counts.true_positives + counts.false_negatives);
        Self {
            counts,
            precision,
            recall,
            f1: f_beta(1.0, precision, recall),
            f2: f_beta(2.0, precision, recall),
        }
    }
}

pub fn f_beta(beta: f64, precision: f64, recall: f64) -> f64 {
    let b2 = beta * beta;
    let den = b2 * precision + recall;
    if den > 0.0 {
        (1.0 + b2) * precision * recall / den
    } else {
        0.0
    }
}

/// The fact with its first argument replaced by [`PERSON_PLACEHOLDER`].
pub fn anonymize_person(fact: &Fact) -> String {
    if fact.arity() == 0 {
        return fact.to_string();
    }
    let mut args: Vec<&str> = (0..fact.arity()).filter_map(|i| fact.arg(i)).collect();
    args[0] = PERSON_PLACEHOLDER;
    format!("{}({})", fact.functor(), args.join(", "))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRun {
    pub input: String,
    pub extracted: FactSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub facts: FactSet,
    pub metrics: Metrics,
    pub runs: Vec<ScenarioRun>,
}

impl CaseResult {
    /// Anonymized extracted facts absent from the reference, one per run.
    pub fn false_positives(&self) -> impl Iterator<Item = String> + '_ {
        let reference: Vec<String> = self.facts.iter().map(anonymize_person).collect();
        self.runs.iter().flat_map(move |run| {
            let mut extra: Vec<String> = run
                .extracted
                .iter()
                .map(anonymize_person)
                .filter(|f| !reference.contains(f))
                .collect();
            extra.sort();
            extra.dedup();
            extra
        })
    }
}

/// Run the extractor over the sampled scenarios of one case. A failed
/// extraction counts as an empty one.
pub async fn run_case(extractor: &FactExtractor, case: &EvaluationCase) -> CaseResult {
    let mut runs = Vec::new();
    let mut counts = Counts::default();

    for (i, scenario) in case.samples().iter().enumerate() {
        info!("Computing scenario {} in {}", i + 1, case.name);
        let (extracted, error) = match extractor.extract(scenario, Some(&case.person_id)).await {
            Ok(extraction) => (extraction.facts, None),
            Err(e) => {
                warn!("Extraction failed for scenario {} of {}: {}", i + 1, case.name, e);
                (FactSet::new(), Some(e.to_string()))
            }
        };
        counts = counts + Counts::compare(&extracted, &case.facts);
        runs.push(ScenarioRun {
            input: scenario.clone(),
            extracted,
            error,
        });
    }

    CaseResult {
        name: case.name.clone(),
        facts: case.facts.clone(),
        metrics: counts.into(),
        runs,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: Metrics,
    pub single_metrics: Metrics,
    pub complex_metrics: Metrics,
    pub single_false_positives: Vec<(String, usize)>,
    pub complex_false_positives: Vec<(String, usize)>,
    pub cases: Vec<CaseResult>,
}

impl EvaluationReport {
    pub fn new(cases: Vec<CaseResult>) -> Self {
        let (single, complex): (Vec<&CaseResult>, Vec<&CaseResult>) =
            cases.iter().partition(|c| c.facts.len() == 1);
        let total = |group: &[&CaseResult]| -> Metrics { group.iter().map(|c| c.metrics.counts).sum::<Counts>().into() };

        Self {
            metrics: cases.iter().map(|c| c.metrics.counts).sum::<Counts>().into(),
            single_metrics: total(&single[..]),
            complex_metrics: total(&complex[..]),
            single_false_positives: histogram(&single),
            complex_false_positives: histogram(&complex),
            cases,
        }
    }
}

/// False positives by frequency, most frequent first.
fn histogram(cases: &[&CaseResult]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for fact in cases.iter().flat_map(|c| c.false_positives()) {
        *counts.entry(fact).or_default() += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}
