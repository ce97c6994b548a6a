//! Case context of one session

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::logic::rights::Jurisdiction;
use crate::memory::facts::{Fact, FactSet, FactStore};
use crate::memory::memo::{FactsKey, TargetKey};
use crate::orchestrator::state::ConversationState;

/// The right and option the user asked about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RightTarget {
    pub right: String,
    pub option: String,
}

#[derive(Debug, Clone)]
pub struct CaseContext {
    pub directive: String,
    pub country: String,
    pub state: ConversationState,
    pub target: Option<RightTarget>,
    store: FactStore,
    implicit_templates: Vec<String>,
}

impl CaseContext {
    pub fn new(directive: impl Into<String>, country: impl Into<String>, implicit_templates: Vec<String>) -> Self {
        Self {
            directive: directive.into(),
            country: country.into(),
            state: ConversationState::default(),
            target: None,
            store: FactStore::new(),
            implicit_templates,
        }
    }

    pub fn facts(&self) -> &FactSet {
        self.store.facts()
    }

    pub fn person_id(&self) -> Option<&str> {
        self.store.person_id()
    }

    pub fn merge_facts(&mut self, extracted: FactSet) -> bool {
        self.store.merge(extracted)
    }

    pub fn national(&self) -> Jurisdiction {
        Jurisdiction::national(self.country.clone())
    }

    /// Facts asserted for every query: the case facts plus the implicit
    /// facts instantiated for the current person.
    pub fn query_facts(&self) -> FactSet {
        let mut facts = self.store.facts().clone();
        if let Some(person) = self.store.person_id() {
            for template in &self.implicit_templates {
                match Fact::from_template(template, person) {
                    Ok(fact) => {
                        facts.insert(fact);
                    }
                    Err(e) => warn!("Skipping implicit fact '{}': {}", template, e),
                }
            }
        }
        facts
    }

    pub fn facts_key(&self) -> FactsKey {
        FactsKey::of(&self.directive, &self.query_facts())
    }

    pub fn target_key(&self) -> Option<TargetKey> {
        self.target
            .as_ref()
            .map(|t| TargetKey::of(&self.directive, &self.country, &t.right, &t.option, self.facts_key()))
    }

    /// Switch to another directive or country, keeping the case facts. A
    /// targeted right belongs to its directive, so a new directive drops it
    /// and leaves the detail phase.
    pub fn select(&mut self, directive: impl Into<String>, country: impl Into<String>) {
        let directive = directive.into();
        if directive != self.directive {
            self.target = None;
            if self.state == ConversationState::Detail {
                self.state = ConversationState::Overview;
            }
        }
        self.directive = directive;
        self.country = country.into();
    }

    /// Back to an empty case; directive and country stay.
    pub fn reset(&mut self) {
        self.store.clear();
        self.state = ConversationState::default();
        self.target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(items: &[&str]) -> FactSet {
        items.iter().map(|s| Fact::parse(s).unwrap()).collect()
    }

    fn context() -> CaseContext {
        CaseContext::new(
            "directive_2010_64",
            "pl",
            vec!["proceeding_status({person}, started)".to_string()],
        )
    }

    #[test]
    fn test_implicit_facts_need_a_person() {
        let mut ctx = context();
        ctx.merge_facts(facts(&["proceeding_type(p, criminal)"]));
        assert_eq!(ctx.query_facts().len(), 1);

        ctx.merge_facts(facts(&["person_status(anna, suspect)"]));
        let query = ctx.query_facts();
        assert!(query.contains(&Fact::parse("proceeding_status(anna, started)").unwrap()));
        assert_eq!(ctx.facts().len(), 1);
    }

    #[test]
    fn test_target_key_follows_target_and_facts() {
        let mut ctx = context();
        assert!(ctx.target_key().is_none());

        ctx.target = Some(RightTarget {
            right: "right_to_interpretation".to_string(),
            option: "questioning".to_string(),
        });
        let before = ctx.target_key();
        ctx.merge_facts(facts(&["person_status(anna, suspect)"]));
        assert_ne!(before, ctx.target_key());
    }

    #[test]
    fn test_reset_keeps_case_selection() {
        let mut ctx = context();
        ctx.merge_facts(facts(&["person_status(anna, suspect)"]));
        ctx.state = ConversationState::Detail;
        ctx.reset();
        assert!(ctx.facts().is_empty());
        assert!(ctx.person_id().is_none());
        assert_eq!(ctx.state, ConversationState::Gathering);
        assert_eq!(ctx.country, "pl");
    }

    #[test]
    fn test_select_keeps_facts() {
        let mut ctx = context();
        ctx.merge_facts(facts(&["person_status(anna, suspect)"]));
        ctx.state = ConversationState::Detail;
        ctx.target = Some(RightTarget {
            right: "right_to_interpretation".to_string(),
            option: "questioning".to_string(),
        });
        let polish = ctx.target_key();
        let eu = ctx.facts_key();

        ctx.select("directive_2010_64", "it");
        assert_eq!(ctx.state, ConversationState::Detail);
        assert_ne!(ctx.target_key(), polish);
        assert_eq!(ctx.facts_key(), eu);

        ctx.select("directive_2012_13", "it");
        assert_eq!(ctx.state, ConversationState::Overview);
        assert!(ctx.target.is_none());
        assert_ne!(ctx.facts_key(), eu);
        assert_eq!(ctx.facts().len(), 1);
    }
}
