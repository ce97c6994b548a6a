//! Conversation state machine
//!
//! Four states, selected each turn from the intent classifier's reply. A
//! reply that cannot be parsed, or a classifier that cannot be reached, is
//! resolved by the configured [`FallbackPolicy`].

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::agent::intent::Intent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Nothing the engine needs to act on.
    Idle,
    /// The user is describing the case.
    #[default]
    Gathering,
    /// The user wants the rights granted by the directive.
    Overview,
    /// The user wants one right explained and compared nationally.
    Detail,
}

impl ConversationState {
    pub fn code(&self) -> u8 {
        match self {
            ConversationState::Idle => 0,
            ConversationState::Gathering => 1,
            ConversationState::Overview => 2,
            ConversationState::Detail => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ConversationState::Idle),
            1 => Some(ConversationState::Gathering),
            2 => Some(ConversationState::Overview),
            3 => Some(ConversationState::Detail),
            _ => None,
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversationState::Idle => "idle",
            ConversationState::Gathering => "gathering",
            ConversationState::Overview => "overview",
            ConversationState::Detail => "detail",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// State chosen when the classifier reply is unusable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    #[default]
    RemainInCurrent,
    Detail,
    Idle,
}

impl FallbackPolicy {
    pub fn resolve(&self, current: ConversationState) -> ConversationState {
        match self {
            FallbackPolicy::RemainInCurrent => current,
            FallbackPolicy::Detail => ConversationState::Detail,
            FallbackPolicy::Idle => ConversationState::Idle,
        }
    }
}

/// The state for this turn and the detail target, if the intent names one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ConversationState,
    pub target: Option<(String, String)>,
    pub fell_back: bool,
}

/// Apply a classified intent, or the fallback when classification failed.
pub fn transition<E: fmt::Display>(
    current: ConversationState,
    intent: Result<Intent, E>,
    policy: FallbackPolicy,
) -> Transition {
    match intent {
        Ok(intent) => {
            let state = intent.state();
            let target = match intent {
                Intent::Detail { right, option, .. } => Some((right, option)),
                _ => None,
            };
            if state != current {
                info!("Conversation state {} -> {}", current, state);
            }
            Transition {
                state,
                target,
                fell_back: false,
            }
        }
        Err(e) => {
            let state = policy.resolve(current);
            warn!("Intent unusable ({}), falling back to {}", e, state);
            Transition {
                state,
                target: None,
                fell_back: true,
            }
        }
    }
}
