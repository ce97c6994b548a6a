//! Conversation session
//!
//! One [`Session`] per user. Each call to [`Session::submit_turn`] runs the
//! whole pipeline for one utterance: intent, fact extraction, directive-level
//! rights, and for a targeted right the national comparison, the conformity
//! assessment and the suggested facts. Engine and evaluator results are
//! memoized by content; failures are reported as warnings and never cached.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::extractor::FactExtractor;
use crate::agent::intent::{IntentClassifier, INTENT_WINDOW};
use crate::agent::narrator::Narrator;
use crate::agent::provider::LLMProvider;
use crate::agent::types::CollaboratorRole;
use crate::argumentation::{
    assess_conformity, expected_pairs, ArgumentationEvaluator, ConformityReport, LabelStrategy, TheoryBuilder,
};
use crate::config::{check_case, AgencyConfig};
use crate::error::{AgencyError, ConfigError};
use crate::logic::query::{QueryRequest, SymbolicQuery};
use crate::logic::rights::{RightRecord, RightsIndex};
use crate::memory::episodic::EpisodicMemory;
use crate::memory::facts::FactSet;
use crate::memory::memo::{FactsKey, MemoCache, TargetKey};
use crate::memory::vocabulary::Vocabulary;
use crate::orchestrator::abduction::{suggestions_from, AbductionSuggester};
use crate::orchestrator::context::{CaseContext, RightTarget};
use crate::orchestrator::prompt::{DetailView, PromptComposer};
use crate::orchestrator::state::{transition, ConversationState, FallbackPolicy};

/// Records about the targeted right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightDetail {
    pub right: String,
    pub option: String,
    pub directive_records: Vec<RightRecord>,
    pub national_records: Vec<RightRecord>,
    /// National records for the same right under other options.
    pub other_options: Vec<RightRecord>,
}

/// Result of one user turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub facts: FactSet,
    pub facts_changed: bool,
    pub rights_overview: Vec<String>,
    pub right_detail: Option<RightDetail>,
    pub conformity: Option<ConformityReport>,
    pub suggested_facts: FactSet,
    pub reply: Option<String>,
    pub warnings: Vec<String>,
}

/// Memo tables of a session.
struct Caches {
    directive_rights: MemoCache<FactsKey, RightsIndex>,
    national_rights: MemoCache<TargetKey, RightsIndex>,
    conformity: MemoCache<TargetKey, ConformityReport>,
    suggestions: MemoCache<TargetKey, FactSet>,
}

impl Caches {
    fn new() -> Self {
        Self {
            directive_rights: MemoCache::new("directive rights"),
            national_rights: MemoCache::new("national rights"),
            conformity: MemoCache::new("conformity"),
            suggestions: MemoCache::new("suggestions"),
        }
    }
}

pub struct Session {
    context: CaseContext,
    history: EpisodicMemory,
    classifier: IntentClassifier,
    extractor: FactExtractor,
    narrator: Option<Narrator>,
    composer: PromptComposer,
    query: SymbolicQuery,
    evaluator: Arc<dyn ArgumentationEvaluator>,
    theory: TheoryBuilder,
    labels: LabelStrategy,
    fallback: FallbackPolicy,
    caches: Caches,
}

impl Session {
    pub fn new(
        config: &AgencyConfig,
        provider: Arc<dyn LLMProvider>,
        query: SymbolicQuery,
        evaluator: Arc<dyn ArgumentationEvaluator>,
        vocabulary: Vocabulary,
    ) -> Self {
        let models = &config.models;
        let case = &config.case;
        let narrator = config
            .conversation
            .narrator
            .then(|| Narrator::new(provider.clone(), models.for_role(CollaboratorRole::Narrator)));

        Self {
            context: CaseContext::new(case.directive.clone(), case.country.clone(), case.implicit_facts.clone()),
            history: EpisodicMemory::new(config.conversation.history_window),
            classifier: IntentClassifier::new(provider.clone(), models.for_role(CollaboratorRole::IntentClassifier)),
            composer: PromptComposer::new(vocabulary.prompt_text(), case.implicit_facts.clone()),
            extractor: FactExtractor::new(provider, models.for_role(CollaboratorRole::FactExtractor), vocabulary),
            narrator,
            query,
            evaluator,
            theory: TheoryBuilder::new([case.country.clone()]).with_labels(config.reasoner.label_strategy()),
            labels: config.reasoner.label_strategy(),
            fallback: config.conversation.fallback,
            caches: Caches::new(),
        }
    }

    pub fn context(&self) -> &CaseContext {
        &self.context
    }

    pub fn history(&self) -> &EpisodicMemory {
        &self.history
    }

    /// Assess the case under another directive or against another country
    /// from the next turn on. `vocabulary` must be the one for the new pair.
    /// Facts and history stay; cached results stay valid since their keys
    /// include the directive and the country.
    pub fn select_case(&mut self, directive: &str, country: &str, vocabulary: Vocabulary) -> Result<(), ConfigError> {
        check_case(directive, country)?;
        self.context.select(directive, country);
        self.theory = TheoryBuilder::new([country]).with_labels(self.labels);
        self.composer.set_vocabulary(vocabulary.prompt_text());
        self.extractor.set_vocabulary(vocabulary);
        info!("Case switched to {} / {}", directive, country);
        Ok(())
    }

    /// Forget the case and the conversation. Cached results stay valid since
    /// they are keyed by content.
    pub fn reset(&mut self) {
        self.context.reset();
        self.history.clear();
        info!("Session reset");
    }

    pub async fn submit_turn(&mut self, utterance: &str) -> TurnOutcome {
        let mut outcome = TurnOutcome::default();
        self.history.add_user(utterance);

        self.select_state(&mut outcome).await;

        if self.context.state == ConversationState::Gathering {
            outcome.facts_changed = self.update_facts(&mut outcome).await;
        }

        let directive_rights = if self.context.state != ConversationState::Idle {
            self.directive_rights(&mut outcome).await
        } else {
            self.cached_directive_rights().await
        };
        if let Some(index) = &directive_rights {
            outcome.rights_overview = index.overview_lines();
        }

        if self.context.state == ConversationState::Detail {
            if let (Some(index), Some(target)) = (&directive_rights, self.context.target.clone()) {
                self.detail(index, &target, &mut outcome).await;
            }
        }

        outcome.state = self.context.state;
        outcome.facts = self.context.facts().clone();
        match self.narrate(&outcome).await {
            Ok(reply) => outcome.reply = reply,
            Err(warning) => outcome.warnings.push(warning),
        }
        if let Some(reply) = &outcome.reply {
            self.history.add_assistant(reply.clone());
        }
        outcome
    }

    async fn select_state(&mut self, outcome: &mut TurnOutcome) {
        let known = self.cached_directive_rights().await.unwrap_or_default();
        let intent = self
            .classifier
            .classify(self.history.last_turns(INTENT_WINDOW), &known)
            .await;
        if let Err(e) = &intent {
            outcome.warnings.push(format!("intent: {}", e));
        }

        let next = transition(self.context.state, intent, self.fallback);
        self.context.state = next.state;
        if let Some((right, option)) = next.target {
            self.context.target = Some(RightTarget { right, option });
        }
    }

    async fn update_facts(&mut self, outcome: &mut TurnOutcome) -> bool {
        let transcript = self.history.user_transcript();
        match self.extractor.extract(&transcript, self.context.person_id()).await {
            Ok(extraction) => {
                for rejected in &extraction.rejected {
                    outcome
                        .warnings
                        .push(format!("rejected fact '{}': {}", rejected.line, rejected.reason));
                }
                self.context.merge_facts(extraction.facts)
            }
            Err(e) => {
                warn!("Fact extraction failed: {}", e);
                outcome.warnings.push(format!("extraction: {}", e));
                false
            }
        }
    }

    async fn cached_directive_rights(&self) -> Option<Arc<RightsIndex>> {
        self.caches.directive_rights.get(&self.context.facts_key()).await
    }

    async fn directive_rights(&self, outcome: &mut TurnOutcome) -> Option<Arc<RightsIndex>> {
        if self.context.facts().is_empty() {
            return None;
        }
        let key = self.context.facts_key();
        let request =
            QueryRequest::new(self.context.person_id(), self.context.query_facts()).directive(self.context.directive.clone());

        let result = self
            .caches
            .directive_rights
            .get_or_try_compute(key, || self.query.query(request))
            .await;
        match result {
            Ok(index) => Some(index),
            Err(e) => {
                warn!("Directive query failed: {}", e);
                outcome.warnings.push(format!("engine: {}", AgencyError::from(e)));
                None
            }
        }
    }

    async fn detail(&self, directive: &RightsIndex, target: &RightTarget, outcome: &mut TurnOutcome) {
        let Some(key) = self.context.target_key() else {
            return;
        };
        let directive_records: Vec<RightRecord> = directive
            .filter_target(&target.right, &target.option)
            .into_iter()
            .cloned()
            .collect();

        let request = AbductionSuggester::request(
            self.context.person_id(),
            self.context.query_facts(),
            &self.context.directive,
            &self.context.country,
            &target.right,
        );
        let national = match self
            .caches
            .national_rights
            .get_or_try_compute(key, || self.query.query(request))
            .await
        {
            Ok(index) => index,
            Err(e) => {
                warn!("National query failed: {}", e);
                outcome.warnings.push(format!("engine: {}", AgencyError::from(e)));
                outcome.right_detail = Some(RightDetail {
                    right: target.right.clone(),
                    option: target.option.clone(),
                    directive_records,
                    national_records: Vec::new(),
                    other_options: Vec::new(),
                });
                return;
            }
        };

        let national_records: Vec<RightRecord> = comparable(national.filter_target(&target.right, &target.option))
            .into_iter()
            .cloned()
            .collect();
        let other_options: Vec<RightRecord> = national
            .filter_other_options(&target.right, &target.option)
            .into_iter()
            .cloned()
            .collect();

        outcome.conformity = Some(self.conformity(key, &directive_records, &national_records, outcome).await);

        let present = self.context.facts().clone();
        let suggestions = self
            .caches
            .suggestions
            .get_or_compute(key, || async { suggestions_from(&national, &target.right, &present) })
            .await;
        outcome.suggested_facts = suggestions.as_ref().clone();

        outcome.right_detail = Some(RightDetail {
            right: target.right.clone(),
            option: target.option.clone(),
            directive_records,
            national_records,
            other_options,
        });
    }

    async fn conformity(
        &self,
        key: TargetKey,
        directive_records: &[RightRecord],
        national_records: &[RightRecord],
        outcome: &mut TurnOutcome,
    ) -> ConformityReport {
        let targets = vec![self.context.country.clone()];
        let reference: Vec<&RightRecord> = directive_records.iter().collect();
        let national: Vec<&RightRecord> = national_records.iter().collect();

        let result = self
            .caches
            .conformity
            .get_or_try_compute(key, || {
                assess_conformity(self.evaluator.as_ref(), &self.theory, &targets, &reference, &national)
            })
            .await;
        match result {
            Ok(report) => {
                outcome.warnings.extend(report.warnings.iter().cloned());
                report.as_ref().clone()
            }
            Err(e) => {
                warn!("Conformity assessment failed: {}", e);
                let message = format!("argumentation: {}", e);
                outcome.warnings.push(message.clone());
                ConformityReport::unknown(&expected_pairs(&targets, &reference), message)
            }
        }
    }

    /// `Ok(None)` when narration is disabled.
    async fn narrate(&self, outcome: &TurnOutcome) -> Result<Option<String>, String> {
        let Some(narrator) = self.narrator.as_ref() else {
            return Ok(None);
        };

        let empty = ConformityReport::default();
        let detail = match (&self.context.target, &outcome.right_detail) {
            (Some(target), Some(detail)) => Some(DetailView {
                target,
                country: &self.context.country,
                directive_records: &detail.directive_records,
                other_options: &detail.other_options,
                conformity: outcome.conformity.as_ref().unwrap_or(&empty),
                suggestions: &outcome.suggested_facts,
            }),
            _ => None,
        };
        let system = self
            .composer
            .compose(self.context.state, self.context.facts(), &outcome.rights_overview, detail);

        narrator.reply(system, &self.history).await.map(Some).map_err(|e| {
            warn!("Narrator failed: {}", e);
            format!("narrator: {}", e)
        })
    }
}

/// National records used for the comparison. Derivations that need no
/// assumed facts are preferred; abduced ones only stand in when nothing is
/// granted outright.
fn comparable(records: Vec<&RightRecord>) -> Vec<&RightRecord> {
    let outright: Vec<&RightRecord> = records.iter().copied().filter(|r| !r.is_abduced()).collect();
    if outright.is_empty() {
        records
    } else {
        outright
    }
}
