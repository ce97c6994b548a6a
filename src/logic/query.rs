//! Symbolic query interface
//!
//! Runs `explain(has_right(...))` for every (jurisdiction, directive) pair of
//! a request and turns the solutions into [`RightRecord`]s. Each engine module
//! is guarded by its own lock for the whole assert, solve, retract sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::logic::engine::{ArticleText, AssertedScope, Goal, LogicEngine, Solution, ABDUCTION_SENTINEL};
use crate::logic::explanation::ExplanationTree;
use crate::logic::rights::{Jurisdiction, RightRecord, RightsIndex};
use crate::memory::facts::{Fact, FactSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub person: Option<String>,
    /// Everything asserted for the query, implicit facts included.
    pub facts: FactSet,
    pub jurisdictions: Vec<Jurisdiction>,
    pub directives: Vec<String>,
    pub right: Option<String>,
    pub option: Option<String>,
    pub abduce: bool,
}

impl QueryRequest {
    pub fn new(person: Option<&str>, facts: FactSet) -> Self {
        Self {
            person: person.map(str::to_string),
            facts,
            jurisdictions: vec![Jurisdiction::Directive],
            directives: Vec::new(),
            right: None,
            option: None,
            abduce: false,
        }
    }

    pub fn jurisdictions(mut self, jurisdictions: Vec<Jurisdiction>) -> Self {
        self.jurisdictions = jurisdictions;
        self
    }

    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn right(mut self, right: impl Into<String>) -> Self {
        self.right = Some(right.into());
        self
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }

    pub fn abduce(mut self, abduce: bool) -> Self {
        self.abduce = abduce;
        self
    }
}

/// One lock per engine module, created on first use.
#[derive(Default)]
struct ModuleLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ModuleLocks {
    fn lock_for(&self, module: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(module.to_string()).or_default().clone()
    }
}

/// Shared handle to the logic engine. Cheap to clone; clones share the
/// engine and the module locks.
#[derive(Clone)]
pub struct SymbolicQuery {
    engine: Arc<dyn LogicEngine>,
    locks: Arc<ModuleLocks>,
}

impl SymbolicQuery {
    pub fn new(engine: Arc<dyn LogicEngine>) -> Self {
        Self {
            engine,
            locks: Arc::new(ModuleLocks::default()),
        }
    }

    /// Run the request on a blocking worker.
    pub async fn query(&self, request: QueryRequest) -> Result<RightsIndex, EngineError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.query_blocking(&request))
            .await
            .map_err(|e| EngineError::Aborted(e.to_string()))?
    }

    pub fn query_blocking(&self, request: &QueryRequest) -> Result<RightsIndex, EngineError> {
        let mut asserted: Vec<Fact> = request.facts.iter().cloned().collect();
        if request.abduce {
            asserted.push(sentinel()?);
        }

        let mut records = Vec::new();
        for directive in &request.directives {
            for jurisdiction in &request.jurisdictions {
                let module = jurisdiction.module(directive);
                let goal = Goal::has_right(jurisdiction.law())
                    .for_person(request.person.as_deref())
                    .restricted_to(request.right.as_deref(), request.option.as_deref());

                let solutions = self.solve_in_module(&module, &asserted, &goal)?;
                debug!("{} solutions for {} in {}", solutions.len(), goal.render(), module);

                for solution in solutions {
                    let explanation = ExplanationTree::process(&solution.explanation, &request.facts);
                    let right = request.right.clone().unwrap_or(solution.right);
                    let article_text = self.article_text(&module, &right, &solution.article);
                    records.push(RightRecord {
                        right,
                        jurisdiction: jurisdiction.clone(),
                        module: module.clone(),
                        article: solution.article,
                        option: request.option.clone().unwrap_or(solution.option),
                        facts_used: explanation.facts_used(),
                        abduced_facts: explanation.abduced_facts(),
                        explanation,
                        article_text,
                    });
                }
            }
        }

        let index = RightsIndex::from_records(records);
        info!(
            "Query over {} module(s) derived {} right record(s)",
            request.directives.len() * request.jurisdictions.len(),
            index.len()
        );
        Ok(index)
    }

    /// Missing article text never fails a query.
    fn article_text(&self, module: &str, right: &str, article: &str) -> Option<ArticleText> {
        match self.engine.article_text(module, right, article) {
            Ok(text) => text,
            Err(e) => {
                warn!("No article text for {} {} in {}: {}", right, article, module, e);
                None
            }
        }
    }

    fn solve_in_module(
        &self,
        module: &str,
        facts: &[Fact],
        goal: &Goal,
    ) -> Result<Vec<Solution>, EngineError> {
        let lock = self.locks.lock_for(module);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let scope = AssertedScope::assert_all(self.engine.as_ref(), module, facts)?;
        scope.solve(goal)
    }
}

fn sentinel() -> Result<Fact, EngineError> {
    Fact::parse(ABDUCTION_SENTINEL).map_err(|e| EngineError::Output(e.to_string()))
}
