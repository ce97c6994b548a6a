//! Argumentation evaluator
//!
//! The grounded-semantics evaluator is an external jar taking the theory as
//! its single argument. Calls are bounded by a timeout and never retried.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use crate::config::ReasonerConfig;
use crate::error::ArgumentationError;
use crate::utils::truncate::{truncate_text, TruncationPolicy};

#[async_trait]
pub trait ArgumentationEvaluator: Send + Sync {
    /// Evaluate a theory and return the raw IN/OUT listing.
    async fn evaluate(&self, theory: &str) -> Result<String, ArgumentationError>;
}

pub struct Arg2pReasoner {
    java: PathBuf,
    jar: PathBuf,
    timeout_secs: u64,
}

impl Arg2pReasoner {
    pub fn new(java: impl Into<PathBuf>, jar: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            jar: jar.into(),
            timeout_secs: 60,
        }
    }

    pub fn from_config(config: &ReasonerConfig) -> Self {
        Self::new(&config.java, &config.jar).with_timeout(config.timeout_secs)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn jar_exists(&self) -> bool {
        self.jar.is_file()
    }
}

#[async_trait]
impl ArgumentationEvaluator for Arg2pReasoner {
    async fn evaluate(&self, theory: &str) -> Result<String, ArgumentationError> {
        debug!("Evaluating theory:\n{}", theory);

        let child = Command::new(&self.java)
            .arg("-jar")
            .arg(&self.jar)
            .arg(theory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ArgumentationError::Spawn)?;

        let output = match timeout(Duration::from_secs(self.timeout_secs), child.wait_with_output()).await {
            Ok(result) => result.map_err(ArgumentationError::Spawn)?,
            Err(_) => return Err(ArgumentationError::Timeout(self.timeout_secs)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ArgumentationError::ExitStatus {
                code: output.status.code(),
                stderr: truncate_text(stderr.trim(), TruncationPolicy::Bytes(2000)),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        info!("Argumentation evaluator returned {} bytes", stdout.len());
        debug!("Evaluator output: {}", truncate_text(&stdout, TruncationPolicy::Bytes(4000)));
        Ok(stdout)
    }
}
