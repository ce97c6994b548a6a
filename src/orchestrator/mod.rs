//! Orchestrator Module
//!
//! Drives the conversation: state selection, the case context, prompt
//! composition, abduction suggestions and the per-turn session pipeline.

pub mod abduction;
pub mod context;
pub mod prompt;
pub mod session;
pub mod state;

pub use abduction::AbductionSuggester;
pub use context::{CaseContext, RightTarget};
pub use prompt::PromptComposer;
pub use session::{RightDetail, Session, TurnOutcome};
pub use state::{ConversationState, FallbackPolicy};
