//! Agency configuration
//!
//! Defaults, optionally overlaid by a YAML file, then by `RIGHTS_AGENCY_*`
//! environment variables (the binaries load `.env` first via `dotenv`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::agent::types::CollaboratorRole;
use crate::argumentation::LabelStrategy;
use crate::error::ConfigError;
use crate::memory::facts::Fact;
use crate::orchestrator::state::FallbackPolicy;

pub const SUPPORTED_DIRECTIVES: [&str; 4] = [
    "directive_2010_64",
    "directive_2012_13",
    "directive_2016_343",
    "directive_2013_48",
];

pub const SUPPORTED_COUNTRIES: [&str; 4] = ["it", "nl", "pl", "bg"];

const ENV_PREFIX: &str = "RIGHTS_AGENCY_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgencyConfig {
    pub provider: ProviderConfig,
    pub models: ModelConfig,
    pub engine: EngineConfig,
    pub reasoner: ReasonerConfig,
    pub case: CaseConfig,
    pub conversation: ConversationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Ollama,
    OpenaiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Total attempts per call, the first one included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Ollama,
            url: "http://localhost:11434".to_string(),
            api_key: None,
            timeout_secs: 120,
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub intent: String,
    pub extraction: String,
    pub narrator: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            intent: CollaboratorRole::IntentClassifier.default_model().to_string(),
            extraction: CollaboratorRole::FactExtractor.default_model().to_string(),
            narrator: CollaboratorRole::Narrator.default_model().to_string(),
        }
    }
}

impl ModelConfig {
    pub fn for_role(&self, role: CollaboratorRole) -> &str {
        match role {
            CollaboratorRole::IntentClassifier => &self.intent,
            CollaboratorRole::FactExtractor => &self.extraction,
            CollaboratorRole::Narrator => &self.narrator,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub swipl: PathBuf,
    /// Holds `<init_file>` and `directives/<directive>/<source>.pl`.
    pub kb_root: PathBuf,
    pub init_file: String,
    /// Country code to the file stem of its implementation module.
    pub implementation_files: BTreeMap<String, String>,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let implementation_files = [
            ("pl", "polish_implementation"),
            ("it", "italian_implementation"),
            ("nl", "dutch_implementation"),
            ("bg", "bulgarian_implementation"),
        ]
        .into_iter()
        .map(|(code, stem)| (code.to_string(), stem.to_string()))
        .collect();

        Self {
            swipl: PathBuf::from("swipl"),
            kb_root: PathBuf::from("prolog"),
            init_file: "my_init.pl".to_string(),
            implementation_files,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    pub java: PathBuf,
    pub jar: PathBuf,
    pub timeout_secs: u64,
    /// Shuffle case-rule labels with this seed instead of numbering them in order.
    pub label_seed: Option<u64>,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            java: PathBuf::from("java"),
            jar: PathBuf::from("argumentation/arg2p_grounded_no_pref_repl.jar"),
            timeout_secs: 60,
            label_seed: None,
        }
    }
}

impl ReasonerConfig {
    pub fn label_strategy(&self) -> LabelStrategy {
        self.label_seed.map_or(LabelStrategy::Sequential, LabelStrategy::Shuffled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseConfig {
    pub directive: String,
    pub country: String,
    pub vocabulary_dir: PathBuf,
    /// Templates over `{person}` asserted with every query.
    pub implicit_facts: Vec<String>,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            directive: SUPPORTED_DIRECTIVES[0].to_string(),
            country: SUPPORTED_COUNTRIES[0].to_string(),
            vocabulary_dir: PathBuf::from("vocabulary"),
            implicit_facts: vec![
                "person_made_aware({person}, personStatus)".to_string(),
                "proceeding_status({person}, started)".to_string(),
                "proceeding_type({person}, criminal)".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub fallback: FallbackPolicy,
    /// Turns of history shown to the narrator.
    pub history_window: usize,
    pub narrator: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::default(),
            history_window: 12,
            narrator: true,
        }
    }
}

impl AgencyConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Overlay `RIGHTS_AGENCY_*` values returned by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| {
            let value = lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty());
            if value.is_some() {
                debug!("Configuration override from {}{}", ENV_PREFIX, name);
            }
            value
        };

        if let Some(url) = var("PROVIDER_URL") {
            self.provider.url = url;
        }
        if let Some(key) = var("API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = var("MODEL") {
            self.models.intent = model.clone();
            self.models.extraction = model.clone();
            self.models.narrator = model;
        }
        if let Some(root) = var("KB_ROOT") {
            self.engine.kb_root = PathBuf::from(root);
        }
        if let Some(dir) = var("VOCABULARY_DIR") {
            self.case.vocabulary_dir = PathBuf::from(dir);
        }
        if let Some(swipl) = var("SWIPL") {
            self.engine.swipl = PathBuf::from(swipl);
        }
        if let Some(jar) = var("REASONER_JAR") {
            self.reasoner.jar = PathBuf::from(jar);
        }
        if let Some(directive) = var("DIRECTIVE") {
            self.case.directive = directive;
        }
        if let Some(country) = var("COUNTRY") {
            self.case.country = country;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_case(&self.case.directive, &self.case.country)?;
        if !self.engine.implementation_files.contains_key(&self.case.country) {
            return Err(ConfigError::Invalid(format!(
                "no implementation file for country '{}'",
                self.case.country
            )));
        }
        if self.provider.max_attempts == 0 {
            return Err(ConfigError::Invalid("provider.max_attempts must be at least 1".to_string()));
        }
        if self.provider.base_delay_ms > self.provider.max_delay_ms {
            return Err(ConfigError::Invalid(
                "provider.base_delay_ms exceeds provider.max_delay_ms".to_string(),
            ));
        }
        for template in &self.case.implicit_facts {
            Fact::from_template(template, "p").map_err(|e| {
                ConfigError::Invalid(format!("implicit fact '{}': {}", template, e))
            })?;
        }
        Ok(())
    }
}

/// Reject a directive or country the knowledge base does not cover.
pub fn check_case(directive: &str, country: &str) -> Result<(), ConfigError> {
    if !SUPPORTED_DIRECTIVES.contains(&directive) {
        return Err(ConfigError::Unsupported {
            kind: "directive",
            value: directive.to_string(),
        });
    }
    if !SUPPORTED_COUNTRIES.contains(&country) {
        return Err(ConfigError::Unsupported {
            kind: "country",
            value: country.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AgencyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.conversation.fallback, FallbackPolicy::RemainInCurrent);
        assert_eq!(config.case.implicit_facts.len(), 3);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AgencyConfig::from_yaml(
            "case:\n  directive: directive_2012_13\n  country: pl\nconversation:\n  fallback: detail\n",
        )
        .unwrap();
        assert_eq!(config.case.directive, "directive_2012_13");
        assert_eq!(config.conversation.fallback, FallbackPolicy::Detail);
        assert_eq!(config.engine.init_file, "my_init.pl");
        assert_eq!(config.provider.max_attempts, 4);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("RIGHTS_AGENCY_COUNTRY", "bg"),
            ("RIGHTS_AGENCY_MODEL", "llama3.1:8b"),
            ("RIGHTS_AGENCY_API_KEY", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AgencyConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.case.country, "bg");
        assert_eq!(config.models.narrator, "llama3.1:8b");
        assert!(config.provider.api_key.is_none());
    }

    #[test]
    fn test_rejects_unsupported_country() {
        let mut config = AgencyConfig::default();
        config.case.country = "fr".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Unsupported { kind: "country", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_implicit_fact() {
        let mut config = AgencyConfig::default();
        config.case.implicit_facts.push("proceeding_type({person}, X)".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agency.yaml");
        std::fs::write(&path, "reasoner:\n  label_seed: 7\n").unwrap();

        let config = AgencyConfig::from_file(&path).unwrap();
        assert_eq!(config.reasoner.label_seed, Some(7));
        assert_eq!(config.reasoner.label_strategy(), LabelStrategy::Shuffled(7));
        assert!(AgencyConfig::from_file(&dir.path().join("missing.yaml")).is_err());
    }
}
