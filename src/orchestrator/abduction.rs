//! Abduction suggester
//!
//! Facts the national implementation would need, beyond the current case, to
//! grant a right: the abduced premises of the right's derivations in the
//! country's module.

use tracing::info;

use crate::error::EngineError;
use crate::logic::query::{QueryRequest, SymbolicQuery};
use crate::logic::rights::{Jurisdiction, RightsIndex};
use crate::memory::facts::FactSet;

/// Abduced premises of `right` in `index`, minus the facts already known.
pub fn suggestions_from(index: &RightsIndex, right: &str, present: &FactSet) -> FactSet {
    index
        .records_for(right)
        .iter()
        .fold(FactSet::new(), |acc, record| acc.union(&record.abduced_facts))
        .difference(present)
}

#[derive(Clone)]
pub struct AbductionSuggester {
    query: SymbolicQuery,
}

impl AbductionSuggester {
    pub fn new(query: SymbolicQuery) -> Self {
        Self { query }
    }

    /// The request whose answer carries the suggestions.
    pub fn request(person: Option<&str>, facts: FactSet, directive: &str, country: &str, right: &str) -> QueryRequest {
        QueryRequest::new(person, facts)
            .jurisdictions(vec![Jurisdiction::national(country)])
            .directive(directive)
            .right(right)
            .abduce(true)
    }

    pub async fn suggest(
        &self,
        person: Option<&str>,
        facts: &FactSet,
        directive: &str,
        country: &str,
        right: &str,
    ) -> Result<FactSet, EngineError> {
        let index = self
            .query
            .query(Self::request(person, facts.clone(), directive, country, right))
            .await?;
        let suggestions = suggestions_from(&index, right, facts);
        info!("{} suggested fact(s) for {} in {}", suggestions.len(), right, country);
        Ok(suggestions)
    }
}
