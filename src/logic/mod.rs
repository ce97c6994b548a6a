//! Symbolic layer
//!
//! The contract with the logic engine, the query interface built on it and
//! the typed view of what the engine derives.

pub mod engine;
pub mod explanation;
pub mod query;
pub mod rights;
pub mod swipl;
pub mod term;

pub use engine::{ArticleText, AssertedScope, Goal, LogicEngine, Solution, ABDUCTION_SENTINEL};
pub use explanation::{ExplanationTree, Leaf};
pub use query::{QueryRequest, SymbolicQuery};
pub use rights::{Jurisdiction, RightRecord, RightsIndex};
pub use swipl::SwiplEngine;
pub use term::{Term, TermParseError};
