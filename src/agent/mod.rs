//! Agent Module
//!
//! The language-model collaborators: intent classification, fact extraction
//! and narration, behind one provider trait with bounded retry.

pub mod evaluation;
pub mod extractor;
pub mod intent;
pub mod narrator;
pub mod provider;
pub mod retry;
pub mod types;

pub use extractor::{Extraction, FactExtractor, RejectedLine};
pub use intent::{parse_intent, Intent, IntentClassifier};
pub use narrator::Narrator;
pub use provider::{LLMProvider, OllamaProvider, OpenAICompatibleProvider};
pub use retry::{RetryPolicy, RetryingProvider};
pub use types::CollaboratorRole;
