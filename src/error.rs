//! Error types
//!
//! One enum per collaborator boundary, folded into [`AgencyError`] for callers
//! that only need to report. Every variant is recoverable within a turn except
//! [`EngineError::Init`], which is raised at startup.

use std::path::PathBuf;
use thiserror::Error;

/// Fact extraction failed to produce a parseable block.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extractor reply contains no fenced block")]
    NoFencedBlock,
    #[error("extractor reply contains {0} fenced blocks, expected exactly one")]
    MultipleBlocks(usize),
    #[error("extractor unavailable: {0}")]
    Provider(String),
}

/// Failures of the symbolic logic engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine initialization failed: {0}")]
    Init(String),
    #[error("assert into module '{module}' failed: {reason}")]
    Assert { module: String, reason: String },
    #[error("query in module '{module}' failed: {reason}")]
    Query { module: String, reason: String },
    #[error("engine timed out after {0} seconds")]
    Timeout(u64),
    #[error("malformed engine output: {0}")]
    Output(String),
    #[error("engine task aborted: {0}")]
    Aborted(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures of the argumentation evaluator. Never retried.
#[derive(Debug, Error)]
pub enum ArgumentationError {
    #[error("failed to launch argumentation evaluator: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("argumentation evaluator exited with status {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },
    #[error("argumentation evaluator timed out after {0} seconds")]
    Timeout(u64),
}

/// The intent classifier replied with something outside the state grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentParseError {
    #[error("empty classifier reply")]
    Empty,
    #[error("no state token in classifier reply '{0}'")]
    NoState(String),
    #[error("ambiguous state token in classifier reply '{0}'")]
    Ambiguous(String),
    #[error("detail reply '{0}' lacks article, right or option")]
    MissingTarget(String),
    #[error("detail reply names unknown right '{right}' with option '{option}'")]
    UnknownTarget { right: String, option: String },
}

/// NLP provider errors, classified for the retry layer.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("transient provider failure: {0}")]
    Transient(String),
    #[error("permanent provider failure: {0}")]
    Permanent(String),
    #[error("provider gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unsupported {kind} '{value}'")]
    Unsupported { kind: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum AgencyError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Argumentation(#[from] ArgumentationError),
    #[error(transparent)]
    Intent(#[from] IntentParseError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type AgencyResult<T> = Result<T, AgencyError>;
