//! Rights Agency command line
//!
//! Describe a case, ask which rights apply, then ask about one of them to see
//! how the national implementation compares.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use rights_agency::agent::provider;
use rights_agency::agent::{LLMProvider, RetryPolicy, RetryingProvider};
use rights_agency::argumentation::Arg2pReasoner;
use rights_agency::config::{AgencyConfig, SUPPORTED_COUNTRIES, SUPPORTED_DIRECTIVES};
use rights_agency::logic::{SwiplEngine, SymbolicQuery};
use rights_agency::memory::Vocabulary;
use rights_agency::orchestrator::{Session, TurnOutcome};
use rights_agency::utils::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AgencyConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    let directives: Vec<String> = SUPPORTED_DIRECTIVES.iter().map(|d| d.to_string()).collect();
    let countries: Vec<String> = SUPPORTED_COUNTRIES
        .iter()
        .filter(|c| config.engine.implementation_files.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    let engine = SwiplEngine::from_config(&config.engine, &directives, &countries)
        .await
        .context("Logic engine unavailable")?;
    let query = SymbolicQuery::new(Arc::new(engine));

    let reasoner = Arg2pReasoner::from_config(&config.reasoner);
    if !reasoner.jar_exists() {
        warn!(
            "Argumentation jar {} not found; conformity will be reported as unknown",
            config.reasoner.jar.display()
        );
    }

    let inner: Arc<dyn LLMProvider> = Arc::from(provider::from_config(&config.provider)?);
    let provider: Arc<dyn LLMProvider> = Arc::new(RetryingProvider::new(
        inner,
        RetryPolicy::from_config(&config.provider),
    ));

    let vocabulary = Vocabulary::load(&config.case.vocabulary_dir, &config.case.directive, &config.case.country)?;
    let mut session = Session::new(&config, provider, query, Arc::new(reasoner), vocabulary);

    println!("\n{}", "═".repeat(60));
    println!("Rights Agency v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "═".repeat(60));
    println!("Directive: {} | Country: {}", config.case.directive, config.case.country);
    println!("{}\n", "═".repeat(60));
    println!("Commands: 'quit' | 'facts' | 'reset' | 'case <directive> <country>'\n");

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let utterance = input.trim();
        if utterance.is_empty() {
            continue;
        }

        match utterance.to_lowercase().as_str() {
            "quit" | "exit" | "q" => {
                println!("\nGoodbye!\n");
                break;
            }
            "facts" => {
                let facts = session.context().facts();
                if facts.is_empty() {
                    println!("\nNo facts yet.\n");
                } else {
                    println!("\nFacts:\n{}\n", facts.canonical_lines().join("\n"));
                }
                continue;
            }
            "reset" => {
                session.reset();
                println!("\nCase cleared.\n");
                continue;
            }
            _ => {}
        }

        if let Some(selection) = utterance.strip_prefix("case ") {
            let parts: Vec<&str> = selection.split_whitespace().collect();
            let [directive, country] = parts[..] else {
                println!("\nUsage: case <directive> <country>\n");
                continue;
            };
            let switched = Vocabulary::load(&config.case.vocabulary_dir, directive, country)
                .and_then(|vocabulary| session.select_case(directive, country, vocabulary));
            match switched {
                Ok(()) => println!("\nDirective: {} | Country: {}\n", directive, country),
                Err(e) => println!("\nCannot switch case: {}\n", e),
            }
            continue;
        }

        let outcome = session.submit_turn(utterance).await;
        info!("Turn finished in state {}", outcome.state);
        print_outcome(&outcome);
    }

    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    println!("\n[{}]", outcome.state);
    if let Some(reply) = &outcome.reply {
        println!("{}", "─".repeat(50));
        println!("{}", reply);
        println!("{}", "─".repeat(50));
    } else {
        if !outcome.rights_overview.is_empty() {
            println!("Rights:\n  {}", outcome.rights_overview.join("\n  "));
        }
        if let Some(report) = &outcome.conformity {
            println!("Conformity:\n{}", report.render_text());
        }
        if !outcome.suggested_facts.is_empty() {
            println!("Also needed: {}", outcome.suggested_facts.canonical_lines().join(", "));
        }
    }
    for warning in &outcome.warnings {
        println!("warning: {}", warning);
    }
    println!();
}
