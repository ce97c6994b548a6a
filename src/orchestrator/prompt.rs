//! Narrator system prompt
//!
//! Phase 1 (gathering) is always present. Phase 2 lists the directive-level
//! rights while the user asks for them. Phase 3 explains the targeted right
//! once its national comparison is available.

use std::fmt::Write as _;

use crate::argumentation::ConformityReport;
use crate::logic::rights::RightRecord;
use crate::memory::facts::FactSet;
use crate::orchestrator::context::RightTarget;
use crate::orchestrator::state::ConversationState;

/// Everything phase 3 talks about.
pub struct DetailView<'a> {
    pub target: &'a RightTarget,
    pub country: &'a str,
    pub directive_records: &'a [RightRecord],
    pub other_options: &'a [RightRecord],
    pub conformity: &'a ConformityReport,
    pub suggestions: &'a FactSet,
}

pub struct PromptComposer {
    vocabulary: String,
    implicit: Vec<String>,
}

impl PromptComposer {
    pub fn new(vocabulary: String, implicit: Vec<String>) -> Self {
        Self { vocabulary, implicit }
    }

    pub fn set_vocabulary(&mut self, vocabulary: String) {
        self.vocabulary = vocabulary;
    }

    pub fn compose(
        &self,
        state: ConversationState,
        facts: &FactSet,
        overview: &[String],
        detail: Option<DetailView<'_>>,
    ) -> String {
        let mut prompt = self.gathering_phase(facts);
        if state == ConversationState::Overview {
            prompt.push_str(&overview_phase(overview));
        }
        if let Some(detail) = detail {
            prompt.push_str(&detail_phase(&detail));
        }
        prompt
    }

    fn gathering_phase(&self, facts: &FactSet) -> String {
        let known = if facts.is_empty() {
            "(none yet)".to_string()
        } else {
            facts.canonical_lines().join("\n")
        };
        format!(
            r#"Follow all instructions of Phase 1, before Phase 2.

Phase 1: Interacting with the user.
Assist the user in building a comprehensive case description, while conversing with the user.
There are certain facts which are essential and always apply, unless explicitly stated otherwise: '''{implicit}'''.

Consider also if any of the following conditions may be relevant: '''{vocabulary}'''.
Evaluate whether these facts can reasonably apply to the given scenario.
Avoid asking yes or no questions. Just ask a few questions on the state of the scenario.

Respect the following instructions:
- DO NOT tell the user what rights may apply.
- DO NOT ask similar questions more than once.

These are the facts the user provided so far:

{known}

After some questions ask the user if they want to know what rights they have.
"#,
            implicit = self.implicit.join(", "),
            vocabulary = self.vocabulary,
        )
    }
}

fn overview_phase(overview: &[String]) -> String {
    let rights = if overview.is_empty() {
        "(no rights were derived)".to_string()
    } else {
        overview.join("\n")
    };
    format!(
        r#"
Phase 2: Presenting the rights computed by the symbolic engine.

Rights granted at the European level (article - right - option):

{rights}

Format of the answer:
- Tell the user the list of computed rights in natural language.
- Match each right to its options and articles. The same right can have more than one option and article.
- Give each right, then a brief reference to the article, then the option.

Respect these instructions:
DO NOT invent any rights, only present what has been computed.
Present all rights.

If no rights apply, ask the user if more details should be provided to the scenario.
If rights are granted, ask if the user wants to know more details about any of these rights.
"#
    )
}

fn detail_phase(detail: &DetailView<'_>) -> String {
    let suggestions = if detail.suggestions.is_empty() {
        "(none)".to_string()
    } else {
        detail.suggestions.canonical_lines().join(", ")
    };
    format!(
        r#"
Phase 3: Explaining the rights.

These are the details on {right} - {option}:

{directive}

Respect this instruction:
DO NOT invent any rights, only present what has been computed.

Ask if the user wants to know about the conformity of the national implementation in {country} with the directive.

Questions on conformity can only be answered based on the following assessment. Do not add anything.
Full conformity means the right and its conditions are identical in the national implementation.
Partial conformity means the right is granted nationally under different conditions; explain the differences.
No conformity means the right is not granted under national law.
Unknown means the assessment could not decide.

{conformity}

Following is the list of rights for different options in the national implementation:

{others}

If there is no list, tell the user no other options are granted in {country}.

These are specific and additional facts required by the national implementation: '''{suggestions}'''.
If there are no facts, tell the user so.
Otherwise tell the user what facts are needed for the national law to apply in this scenario, with a brief explanation of each.
"#,
        right = detail.target.right,
        option = detail.target.option,
        country = detail.country,
        directive = describe_records(detail.directive_records),
        conformity = if detail.conformity.is_empty() {
            "(no assessment)".to_string()
        } else {
            detail.conformity.render_text()
        },
        others = describe_records(detail.other_options),
    )
}

/// Plain-text account of each record and its derivation.
pub fn describe_records(records: &[RightRecord]) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push_str("\nHere is the next right:\n\n");
        }
        let _ = writeln!(out, "Right: {}", record.right);
        let _ = writeln!(out, "Source: {} {}", record.jurisdiction, record.article);
        if let Some(text) = &record.article_text {
            let _ = writeln!(out, "Article title: {}", text.title);
            let _ = writeln!(out, "Article text: {}", text.text);
            if let Some(comment) = &text.comment {
                let _ = writeln!(out, "Note: {}", comment);
            }
        }
        let _ = writeln!(out, "Option: {}", record.option);
        let _ = writeln!(out, "Derivation:\n{}", record.explanation.render_text());
    }
    out
}
