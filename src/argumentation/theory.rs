//! Argumentation theory builder
//!
//! A theory is the fixed structural rules, which compare a reference right
//! against each target jurisdiction, followed by one labelled rule per right
//! record. Reference records become strict rules (`:->`), national records
//! defeasible ones (`:=>`).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::logic::rights::{RightRecord, DIRECTIVE_LABEL};
use crate::logic::term::quote_atom;

/// How case rules are labelled. Labels never influence the evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStrategy {
    #[default]
    Sequential,
    Shuffled(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRule {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentationTheory {
    pub structural: String,
    pub case_rules: Vec<CaseRule>,
}

impl ArgumentationTheory {
    /// Full theory text handed to the evaluator.
    pub fn text(&self) -> String {
        let rules = self
            .case_rules
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n\n{}\n", self.structural, rules)
    }

    pub fn is_empty(&self) -> bool {
        self.case_rules.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TheoryBuilder {
    targets: Vec<String>,
    labels: LabelStrategy,
}

impl TheoryBuilder {
    pub fn new(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            labels: LabelStrategy::Sequential,
        }
    }

    pub fn with_labels(mut self, labels: LabelStrategy) -> Self {
        self.labels = labels;
        self
    }

    /// Rules r1 to r3 and the conflict declaration. Depends only on the targets.
    pub fn structural_rules(&self) -> String {
        let targets = format!(
            "[{}]",
            self.targets.iter().map(|t| quote_atom(t)).collect::<Vec<_>>().join(", ")
        );
        let reference = DIRECTIVE_LABEL;
        [
            format!(
                "r1 : right({reference}, Art, Right, Option, Facts), prolog(member(Y, {targets})), \
                 right(Y, Art1, Right, Option, Facts) -> conformity(Y, Art)."
            ),
            format!(
                "r2 : right({reference}, Art, Right, Option, Facts), prolog(member(Y, {targets})), \
                 right(Y, Art1, Right, Option, Facts1), prolog(Facts \\= Facts1) => partialConformity(Y, Art)."
            ),
            format!(
                "r3 : right({reference}, Art, Right, Option, Facts), prolog(member(Y, {targets})), \
                 ~(right(Y, Art1, Right, Option, Facts)) -> -conformity(Y, Art)."
            ),
            "conflict([conformity(Y, Art)], [partialConformity(Y, Art)]).".to_string(),
        ]
        .join("\n")
    }

    /// Theory over the reference records followed by the national ones.
    pub fn build(&self, reference: &[&RightRecord], national: &[&RightRecord]) -> ArgumentationTheory {
        let records: Vec<&RightRecord> = reference.iter().chain(national.iter()).copied().collect();
        let labels = self.labels(records.len());

        let case_rules = records
            .iter()
            .zip(labels)
            .map(|(record, label)| CaseRule {
                text: case_rule(&label, record),
                label,
            })
            .collect();

        ArgumentationTheory {
            structural: self.structural_rules(),
            case_rules,
        }
    }

    fn labels(&self, count: usize) -> Vec<String> {
        let mut numbers: Vec<usize> = (1..=count).collect();
        if let LabelStrategy::Shuffled(seed) = self.labels {
            numbers.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        numbers.into_iter().map(|n| format!("f{}", n)).collect()
    }
}

/// `f1 :-> right(directive, art3, right, option, [facts]).`
pub fn case_rule(label: &str, record: &RightRecord) -> String {
    let arrow = if record.jurisdiction.is_directive() { ":->" } else { ":=>" };
    let premises = record
        .premises()
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} {} right({}, {}, {}, {}, [{}]).",
        label,
        arrow,
        quote_atom(record.jurisdiction.label()),
        quote_atom(&record.article),
        quote_atom(&record.right),
        quote_atom(&record.option),
        premises
    )
}
