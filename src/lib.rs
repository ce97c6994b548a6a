//! Rights Agency
//!
//! A conversational assistant that works out which procedural rights an EU
//! directive grants in a described case, and whether a national
//! implementation grants them too:
//! - fact extraction and intent classification through a chat model
//! - rights derivation with explanations from a Prolog knowledge base
//! - conformity assessment by grounded argumentation
//! - suggestions of the facts a national law additionally requires

pub mod agent;
pub mod argumentation;
pub mod config;
pub mod error;
pub mod logic;
pub mod memory;
pub mod orchestrator;
pub mod utils;

// Re-exports for convenience
pub use config::AgencyConfig;
pub use error::{AgencyError, AgencyResult};
pub use orchestrator::{Session, TurnOutcome};
