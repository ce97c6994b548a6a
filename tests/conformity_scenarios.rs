mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::*;
use rights_agency::argumentation::{
    assess_conformity, classify, ConformityVerdict, LabelStrategy, TheoryBuilder,
};
use rights_agency::logic::{Jurisdiction, QueryRequest, RightRecord, RightsIndex, SymbolicQuery};
use rights_agency::orchestrator::AbductionSuggester;

const COUNTRY: &str = "pl";

fn national_module() -> String {
    format!("{}_{}", DIRECTIVE, COUNTRY)
}

fn directive_rule() -> Rule {
    Rule::new(
        ARTICLE,
        RIGHT,
        OPTION,
        &["person_status(p, suspect)", "proceeding_type(p, europeanArrestWarrant)"],
    )
}

async fn directive_rights(query: &SymbolicQuery) -> RightsIndex {
    query
        .query(QueryRequest::new(Some("p"), case_facts()).directive(DIRECTIVE))
        .await
        .unwrap()
}

async fn national_rights(query: &SymbolicQuery) -> RightsIndex {
    query
        .query(AbductionSuggester::request(Some("p"), case_facts(), DIRECTIVE, COUNTRY, RIGHT))
        .await
        .unwrap()
}

async fn verdict_for(engine: RuleEngine, labels: LabelStrategy) -> (ConformityVerdict, RightsIndex) {
    let query = SymbolicQuery::new(Arc::new(engine));
    let eu = directive_rights(&query).await;
    let national = national_rights(&query).await;

    let reference = eu.filter_target(RIGHT, OPTION);
    let target = national.filter_target(RIGHT, OPTION);
    assert_eq!(reference.len(), 1);

    let evaluator = GroundedMock::default();
    let builder = TheoryBuilder::new([COUNTRY]).with_labels(labels);
    let report = assess_conformity(&evaluator, &builder, &[COUNTRY.to_string()], &reference, &target)
        .await
        .unwrap();

    assert_eq!(report.entries.len(), 1);
    (report.verdict(COUNTRY, ARTICLE).unwrap(), national)
}

#[tokio::test]
async fn test_identical_national_rule_is_full_conformity() {
    let engine = RuleEngine::new()
        .with_rule(DIRECTIVE, directive_rule())
        .with_rule(&national_module(), Rule::new("art5", RIGHT, OPTION, &[
            "person_status(p, suspect)",
            "proceeding_type(p, europeanArrestWarrant)",
        ]));

    let (verdict, _) = verdict_for(engine, LabelStrategy::Sequential).await;
    assert_eq!(verdict, ConformityVerdict::Full);
}

#[tokio::test]
async fn test_extra_national_condition_is_partial_conformity() {
    let engine = RuleEngine::new().with_rule(DIRECTIVE, directive_rule()).with_rule(
        &national_module(),
        Rule::new("art5", RIGHT, OPTION, &[
            "person_status(p, suspect)",
            "proceeding_type(p, europeanArrestWarrant)",
        ])
        .abducible(&["person_document(p, charge)"]),
    );

    let (verdict, national) = verdict_for(engine, LabelStrategy::Sequential).await;
    assert_eq!(verdict, ConformityVerdict::Partial);

    let record: &RightRecord = national.filter_target(RIGHT, OPTION)[0];
    assert!(record.abduced_facts.contains(&fact("person_document(p, charge)")));
}

#[tokio::test]
async fn test_missing_national_rule_is_no_conformity() {
    let engine = RuleEngine::new().with_rule(DIRECTIVE, directive_rule());

    let (verdict, national) = verdict_for(engine, LabelStrategy::Sequential).await;
    assert_eq!(verdict, ConformityVerdict::None);
    assert!(national.is_empty());
}

#[tokio::test]
async fn test_relabeling_never_changes_the_verdict() {
    let build = || {
        RuleEngine::new().with_rule(DIRECTIVE, directive_rule()).with_rule(
            &national_module(),
            Rule::new("art5", RIGHT, OPTION, &["person_status(p, suspect)"]),
        )
    };

    let (baseline, _) = verdict_for(build(), LabelStrategy::Sequential).await;
    for seed in [1, 7, 42, 1234] {
        let (verdict, _) = verdict_for(build(), LabelStrategy::Shuffled(seed)).await;
        assert_eq!(verdict, baseline, "seed {}", seed);
    }
}

#[tokio::test]
async fn test_structural_rules_are_identical_across_theories() {
    let query = SymbolicQuery::new(Arc::new(RuleEngine::new().with_rule(DIRECTIVE, directive_rule())));
    let eu = directive_rights(&query).await;
    let reference = eu.filter_target(RIGHT, OPTION);

    let evaluator = GroundedMock::default();
    for seed in [3, 9] {
        let builder = TheoryBuilder::new([COUNTRY]).with_labels(LabelStrategy::Shuffled(seed));
        assess_conformity(&evaluator, &builder, &[COUNTRY.to_string()], &reference, &[])
            .await
            .unwrap();
    }

    let theories = evaluator.theories.lock().unwrap();
    assert_eq!(theories.len(), 2);
    let structural = |t: &str| t.lines().take(4).collect::<Vec<_>>().join("\n");
    assert_eq!(structural(&theories[0]), structural(&theories[1]));
}

#[test]
fn test_verdicts_are_mutually_exclusive() {
    let expected: BTreeSet<(String, String)> = [(COUNTRY.to_string(), ARTICLE.to_string())].into();
    let outputs = [
        "IN\nconformity(pl, art2)\npartialConformity(pl, art2)\n",
        "IN\nconformity(pl, art2)\n'-'(conformity(pl, art2))\n",
        "IN\nconformity(pl, art2)\npartial_conformity(pl, art2)\n-conformity(pl, art2)\n",
    ];
    for output in outputs {
        let report = classify(output, &expected);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.verdict(COUNTRY, ARTICLE), Some(ConformityVerdict::Unknown));
        assert!(!report.warnings.is_empty());
    }
}

#[tokio::test]
async fn test_suggestions_are_new_premises_of_the_right() {
    let engine = RuleEngine::new()
        .with_rule(
            &national_module(),
            Rule::new("art5", RIGHT, OPTION, &["person_status(p, suspect)"])
                .abducible(&["person_document(p, charge)", "proceeding_language(p, polish)"]),
        )
        .with_rule(
            &national_module(),
            Rule::new("art9", "right_to_translation", "documents", &["person_status(p, suspect)"])
                .abducible(&["person_language(p, english)"]),
        );
    let engine = Arc::new(engine);
    let suggester = AbductionSuggester::new(SymbolicQuery::new(engine.clone()));

    let present = case_facts();
    let suggested = suggester
        .suggest(Some("p"), &present, DIRECTIVE, COUNTRY, RIGHT)
        .await
        .unwrap();

    assert_eq!(
        suggested,
        facts(&["person_document(p, charge)", "proceeding_language(p, polish)"])
    );
    assert!(suggested.iter().all(|f| !present.contains(f)));
    assert_eq!(engine.asserted(&national_module()), 0);

    let with_document = present.union(&facts(&["person_document(p, charge)"]));
    let suggested = suggester
        .suggest(Some("p"), &with_document, DIRECTIVE, COUNTRY, RIGHT)
        .await
        .unwrap();
    assert_eq!(suggested, facts(&["proceeding_language(p, polish)"]));
}

#[tokio::test]
async fn test_national_records_carry_their_jurisdiction() {
    let engine = RuleEngine::new().with_rule(
        &national_module(),
        Rule::new("art5", RIGHT, OPTION, &["person_status(p, suspect)"]),
    );
    let query = SymbolicQuery::new(Arc::new(engine));
    let national = national_rights(&query).await;

    let record = &national.records_for(RIGHT)[0];
    assert_eq!(record.jurisdiction, Jurisdiction::national(COUNTRY));
    assert_eq!(record.module, national_module());
    assert_eq!(record.facts_used, facts(&["person_status(p, suspect)"]));
}
