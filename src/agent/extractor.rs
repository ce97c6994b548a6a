//! Fact extraction
//!
//! Turns the user's case description into ground facts through the extraction
//! model. The reply must hold exactly one fenced block; every line of it is
//! checked on its own, so one bad line never discards the rest.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::provider::{into_provider_error, LLMProvider};
use crate::agent::types::CollaboratorRole;
use crate::error::ExtractionError;
use crate::memory::facts::{Fact, FactSet};
use crate::memory::vocabulary::Vocabulary;
use crate::utils::truncate::{truncate_text, TruncationPolicy};

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedLine {
    pub line: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub facts: FactSet,
    pub rejected: Vec<RejectedLine>,
}

/// Contents of the single fenced block of `reply`. An unterminated fence
/// still counts as a block.
pub fn fenced_block(reply: &str) -> Result<String, ExtractionError> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut open = false;

    for line in reply.lines() {
        if line.trim_start().starts_with(FENCE) {
            if !open {
                blocks.push(Vec::new());
            }
            open = !open;
            continue;
        }
        if open {
            if let Some(block) = blocks.last_mut() {
                block.push(line);
            }
        }
    }

    match blocks.len() {
        0 => Err(ExtractionError::NoFencedBlock),
        1 => Ok(blocks.remove(0).join("\n")),
        n => Err(ExtractionError::MultipleBlocks(n)),
    }
}

/// Check each line of a fenced block against the grammar and the vocabulary.
pub fn parse_block(block: &str, vocabulary: &Vocabulary) -> Extraction {
    let mut extraction = Extraction::default();

    for raw in block.lines() {
        let line = raw.split('%').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let rejection = match Fact::parse(line) {
            Ok(fact) if vocabulary.allows(&fact) => {
                extraction.facts.insert(fact);
                continue;
            }
            Ok(fact) => format!("predicate {}/{} is not in the vocabulary", fact.functor(), fact.arity()),
            Err(e) => e.to_string(),
        };
        warn!("Rejected extracted line '{}': {}", line, rejection);
        extraction.rejected.push(RejectedLine {
            line: line.to_string(),
            reason: rejection,
        });
    }

    extraction
}

pub fn extraction_prompt(user_text: &str, vocabulary: &Vocabulary, person: Option<&str>) -> String {
    let person_line = person.map(|p| format!("PersonId is {}.", p)).unwrap_or_default();
    format!(
        r#"Assist the user in building a comprehensive case description by extracting relevant Prolog facts.

Consider if any of the following conditions may be relevant:
'''
{vocabulary}
'''

Evaluate whether these facts can reasonably apply to the given scenario.

Respect the following instructions:
- DO NOT create new facts.
- If the input is not relevant do not extract any fact.

Format of the output:
- INCLUDE THE EXTRACTED PROLOG FACTS inside a single markdown block.
- DO NOT create more than one block. Keep all facts in a single one.
- DO NOT put comments inside the markdown block.
- All constants must start with a lowercase letter for a fact to be valid.

{person_line}

Here is the user input:

{user_text}"#,
        vocabulary = vocabulary.prompt_text(),
    )
}

pub struct FactExtractor {
    provider: Arc<dyn LLMProvider>,
    model: String,
    vocabulary: Vocabulary,
}

impl FactExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>, vocabulary: Vocabulary) -> Self {
        Self {
            provider,
            model: model.into(),
            vocabulary,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn set_vocabulary(&mut self, vocabulary: Vocabulary) {
        self.vocabulary = vocabulary;
    }

    /// Extract the complete case description from `user_text`.
    pub async fn extract(&self, user_text: &str, person: Option<&str>) -> Result<Extraction, ExtractionError> {
        let prompt = extraction_prompt(user_text, &self.vocabulary, person);
        let system = CollaboratorRole::FactExtractor.system_prompt().map(str::to_string);

        let reply = self
            .provider
            .generate(&self.model, prompt, system)
            .await
            .map_err(|e| ExtractionError::Provider(into_provider_error(e).to_string()))?;
        debug!("Extractor reply: {}", truncate_text(&reply, TruncationPolicy::Bytes(600)));

        let block = fenced_block(&reply)?;
        let extraction = parse_block(&block, &self.vocabulary);
        info!(
            "Extracted {} fact(s), rejected {} line(s)",
            extraction.facts.len(),
            extraction.rejected.len()
        );
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    const VOCABULARY: &str = r#"
person_status(PersonId, suspect).
proceeding_type(PersonId, criminal).
person_document(PersonId, charge).
"#;

    fn vocabulary() -> Vocabulary {
        Vocabulary::from_sources(vec![VOCABULARY.to_string()])
    }

    struct ReplyProvider(String);

    #[async_trait]
    impl LLMProvider for ReplyProvider {
        async fn generate(&self, _model: &str, prompt: String, _system: Option<String>) -> anyhow::Result<String> {
            assert!(prompt.contains("PersonId is p."));
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_single_block_is_extracted() {
        let reply = "Here you go:\n```prolog\nperson_status(p, suspect).\n```\nAnything else?";
        assert_eq!(fenced_block(reply).unwrap(), "person_status(p, suspect).");
    }

    #[test]
    fn test_block_count_is_enforced() {
        assert!(matches!(fenced_block("no code here"), Err(ExtractionError::NoFencedBlock)));
        let two = "```\na(x).\n```\ntext\n```\nb(y).\n```";
        assert!(matches!(fenced_block(two), Err(ExtractionError::MultipleBlocks(2))));
        assert_eq!(fenced_block("```\na(x).").unwrap(), "a(x).");
    }

    #[test]
    fn test_lines_are_checked_individually() {
        let block = "person_status(p, suspect). % the suspect\n\
                     proceeding_type(p,criminal)\n\
                     favourite_colour(p, blue).\n\
                     person_status(P, suspect).\n\
                     \n\
                     person_document(p, charge";
        let extraction = parse_block(block, &vocabulary());

        let facts: Vec<&str> = extraction.facts.iter().map(Fact::as_str).collect();
        assert_eq!(facts, vec!["person_status(p, suspect)", "proceeding_type(p, criminal)"]);
        assert_eq!(extraction.rejected.len(), 3);
        assert!(extraction.rejected[0].reason.contains("not in the vocabulary"));
    }

    #[tokio::test]
    async fn test_extract_end_to_end() {
        let reply = "```\nperson_status(p, suspect).\nproceeding_type(p, criminal).\n```".to_string();
        let extractor = FactExtractor::new(Arc::new(ReplyProvider(reply)), "m", vocabulary());

        let extraction = extractor.extract("I was arrested", Some("p")).await.unwrap();
        assert_eq!(extraction.facts.len(), 2);
        assert!(extraction.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_extract_without_block_fails() {
        let extractor = FactExtractor::new(Arc::new(ReplyProvider("nothing".to_string())), "m", vocabulary());
        assert!(matches!(
            extractor.extract("hello", Some("p")).await,
            Err(ExtractionError::NoFencedBlock)
        ));
    }
}
