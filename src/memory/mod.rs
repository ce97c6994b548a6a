//! Memory System Module
//!
//! Session-scoped state: case facts, conversation history, the fact
//! vocabulary and the content-addressed memo tables.

pub mod episodic;
pub mod facts;
pub mod memo;
pub mod vocabulary;

pub use episodic::{ConversationTurn, EpisodicMemory, Role};
pub use facts::{Fact, FactParseError, FactSet, FactStore};
pub use memo::{CacheKey, FactsKey, MemoCache, TargetKey};
pub use vocabulary::{Signature, Vocabulary};
