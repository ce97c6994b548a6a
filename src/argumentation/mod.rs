//! Argumentation Module
//!
//! Conformity of a national implementation with the directive, decided by an
//! external grounded-semantics evaluator over a synthesized theory.

pub mod classifier;
pub mod reasoner;
pub mod theory;

pub use classifier::{classify, ConformityEntry, ConformityReport, ConformityVerdict};
pub use reasoner::{Arg2pReasoner, ArgumentationEvaluator};
pub use theory::{ArgumentationTheory, LabelStrategy, TheoryBuilder};

use std::collections::BTreeSet;
use tracing::info;

use crate::error::ArgumentationError;
use crate::logic::rights::RightRecord;

/// Pairs reported for a comparison: every target against every reference article.
pub fn expected_pairs(targets: &[String], reference: &[&RightRecord]) -> BTreeSet<(String, String)> {
    targets
        .iter()
        .flat_map(|t| reference.iter().map(move |r| (t.clone(), r.article.clone())))
        .collect()
}

/// Build the theory, evaluate it and classify the result.
pub async fn assess_conformity(
    evaluator: &dyn ArgumentationEvaluator,
    builder: &TheoryBuilder,
    targets: &[String],
    reference: &[&RightRecord],
    national: &[&RightRecord],
) -> Result<ConformityReport, ArgumentationError> {
    let expected = expected_pairs(targets, reference);
    if reference.is_empty() {
        return Ok(ConformityReport::default());
    }

    let theory = builder.build(reference, national);
    let output = evaluator.evaluate(&theory.text()).await?;
    let report = classify(&output, &expected);
    info!(
        "Conformity assessed for {} pair(s): {}",
        report.entries.len(),
        report.render_text().replace('\n', "; ")
    );
    Ok(report)
}
