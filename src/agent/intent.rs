//! Intent classification
//!
//! The classifier model answers with a state digit, or for the detail state
//! with `3 - article - right - option`. The reply is parsed against that
//! grammar into an [`Intent`]; anything else is an [`IntentParseError`].

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::agent::provider::{into_provider_error, LLMProvider};
use crate::agent::types::CollaboratorRole;
use crate::error::{AgencyResult, IntentParseError};
use crate::logic::rights::RightsIndex;
use crate::memory::episodic::{format_turns, ConversationTurn};
use crate::orchestrator::state::ConversationState;
use crate::utils::truncate::{truncate_text, TruncationPolicy};

/// Number of trailing turns the classifier sees.
pub const INTENT_WINDOW: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Idle,
    Gathering,
    Overview,
    Detail {
        article: String,
        right: String,
        option: String,
    },
}

impl Intent {
    pub fn state(&self) -> ConversationState {
        match self {
            Intent::Idle => ConversationState::Idle,
            Intent::Gathering => ConversationState::Gathering,
            Intent::Overview => ConversationState::Overview,
            Intent::Detail { .. } => ConversationState::Detail,
        }
    }
}

/// Parse a classifier reply.
pub fn parse_intent(reply: &str) -> Result<Intent, IntentParseError> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(IntentParseError::Empty);
    }

    let tokens: Vec<&str> = reply
        .split('-')
        .map(|t| t.trim().trim_matches(|c| matches!(c, '"' | '\'' | '`' | '.')).trim())
        .collect();

    let digits: BTreeSet<char> = tokens[0].chars().filter(|c| ('0'..='3').contains(c)).collect();
    let state = match digits.len() {
        0 => return Err(IntentParseError::NoState(reply.to_string())),
        1 => digits.into_iter().next(),
        _ => return Err(IntentParseError::Ambiguous(reply.to_string())),
    };

    match state {
        Some('0') => Ok(Intent::Idle),
        Some('1') => Ok(Intent::Gathering),
        Some('2') => Ok(Intent::Overview),
        _ => {
            if tokens.len() > 4 {
                return Err(IntentParseError::Ambiguous(reply.to_string()));
            }
            match tokens[1..] {
                [article, right, option] if !article.is_empty() && !right.is_empty() && !option.is_empty() => {
                    Ok(Intent::Detail {
                        article: article.to_string(),
                        right: right.to_string(),
                        option: option.to_string(),
                    })
                }
                _ => Err(IntentParseError::MissingTarget(reply.to_string())),
            }
        }
    }
}

/// Reject a detail target the directive-level rights do not contain.
pub fn check_target(intent: Intent, known: &RightsIndex) -> Result<Intent, IntentParseError> {
    if let Intent::Detail { right, option, .. } = &intent {
        if !known.contains_target(right, option) {
            return Err(IntentParseError::UnknownTarget {
                right: right.clone(),
                option: option.clone(),
            });
        }
    }
    Ok(intent)
}

pub fn intent_prompt(turns: &[ConversationTurn], overview: &[String]) -> String {
    format!(
        r#"In the context of a system assisting a user in building a comprehensive case description and providing info on the rights applicable to the case.
According to the following input, what does the user want to do?

0. None of the following;
1. Provide new details to the scenario;
2. Know which rights are deducible from their scenario;
3. Know about one of these specific rights: [{rights}]

Reply "0" if 0, "1" if 1, "2" if 2, and "3 - article - right - option (from the list)" if 3.
Do not include anything else in your output.

{history}"#,
        rights = overview.join("; "),
        history = format_turns(turns),
    )
}

pub struct IntentClassifier {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Classify the last turns of the conversation. `known` holds the
    /// directive-level rights a detail request may name.
    pub async fn classify(&self, turns: &[ConversationTurn], known: &RightsIndex) -> AgencyResult<Intent> {
        let start = turns.len().saturating_sub(INTENT_WINDOW);
        let prompt = intent_prompt(&turns[start..], &known.overview_lines());
        let system = CollaboratorRole::IntentClassifier.system_prompt().map(str::to_string);

        let reply = self
            .provider
            .generate(&self.model, prompt, system)
            .await
            .map_err(into_provider_error)?;
        debug!("Intent reply: {}", truncate_text(&reply, TruncationPolicy::Bytes(200)));

        let intent = check_target(parse_intent(&reply)?, known)?;
        info!("Intent classified as {:?}", intent);
        Ok(intent)
    }
}
