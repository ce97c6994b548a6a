//! Score the fact extractor against a directory of case files.
//!
//! Usage: eval_extraction <dataset-dir> [output.json]

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use rights_agency::agent::evaluation::{load_cases, run_case, EvaluationReport};
use rights_agency::agent::provider;
use rights_agency::agent::types::CollaboratorRole;
use rights_agency::agent::{FactExtractor, LLMProvider, RetryPolicy, RetryingProvider};
use rights_agency::config::AgencyConfig;
use rights_agency::memory::Vocabulary;
use rights_agency::utils::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(dataset) = args.next().map(PathBuf::from) else {
        bail!("usage: eval_extraction <dataset-dir> [output.json]");
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("results_{}.json", chrono::Utc::now().timestamp())));

    let config = AgencyConfig::load(None).context("Failed to load configuration")?;
    let inner: Arc<dyn LLMProvider> = Arc::from(provider::from_config(&config.provider)?);
    let provider: Arc<dyn LLMProvider> = Arc::new(RetryingProvider::new(
        inner,
        RetryPolicy::from_config(&config.provider),
    ));

    let cases = load_cases(&dataset)?;
    info!("Loaded {} case(s) from {}", cases.len(), dataset.display());

    let mut results = Vec::with_capacity(cases.len());
    for case in &cases {
        let vocabulary = Vocabulary::load(&config.case.vocabulary_dir, &case.directive, &case.country)?;
        let extractor = FactExtractor::new(provider.clone(), config.models.for_role(CollaboratorRole::FactExtractor), vocabulary);
        results.push(run_case(&extractor, case).await);
    }

    let report = EvaluationReport::new(results);
    let m = &report.metrics;
    println!(
        "precision {:.3} | recall {:.3} | f1 {:.3} | f2 {:.3} (tp {}, fp {}, fn {})",
        m.precision, m.recall, m.f1, m.f2, m.counts.true_positives, m.counts.false_positives, m.counts.false_negatives
    );

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&output, json).with_context(|| format!("cannot write {}", output.display()))?;
    println!("Report written to {}", output.display());
    Ok(())
}
