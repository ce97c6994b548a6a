//! SWI-Prolog adapter
//!
//! Runs `swipl` as a subprocess for every solve. The module's asserted facts
//! are mirrored in process and replayed into the generated program, which
//! prints one JSON object per solution of `explain/2`. Article texts are read
//! from the comment block that follows each article's first clause.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::runtime::{Builder, Handle};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::logic::engine::{ArticleText, Goal, LogicEngine, Solution};
use crate::logic::rights::Jurisdiction;
use crate::memory::facts::Fact;
use crate::utils::truncate::{truncate_text, TruncationPolicy};

pub struct SwiplEngine {
    binary: PathBuf,
    init_file: PathBuf,
    modules: BTreeMap<String, PathBuf>,
    timeout: Duration,
    asserted: Mutex<HashMap<String, Vec<Fact>>>,
}

impl SwiplEngine {
    /// Resolve and check every module source for the given directives and
    /// countries. Fails if the binary or any source file is missing.
    pub async fn from_config(
        config: &EngineConfig,
        directives: &[String],
        countries: &[String],
    ) -> Result<Self, EngineError> {
        let mut modules = BTreeMap::new();
        for directive in directives {
            let mut jurisdictions = vec![Jurisdiction::Directive];
            jurisdictions.extend(countries.iter().map(Jurisdiction::national));
            for jurisdiction in jurisdictions {
                let stem = match &jurisdiction {
                    Jurisdiction::Directive => directive.clone(),
                    Jurisdiction::National(code) => config
                        .implementation_files
                        .get(code)
                        .cloned()
                        .ok_or_else(|| {
                            EngineError::Init(format!("no implementation file configured for '{}'", code))
                        })?,
                };
                let path = config
                    .kb_root
                    .join("directives")
                    .join(directive)
                    .join(format!("{}.pl", stem));
                modules.insert(jurisdiction.module(directive), path);
            }
        }

        let engine = Self {
            binary: config.swipl.clone(),
            init_file: config.kb_root.join(&config.init_file),
            modules,
            timeout: Duration::from_secs(config.timeout_secs),
            asserted: Mutex::new(HashMap::new()),
        };
        engine.check().await?;
        Ok(engine)
    }

    async fn check(&self) -> Result<(), EngineError> {
        if !self.init_file.is_file() {
            return Err(EngineError::Init(format!(
                "knowledge base init file {} not found",
                self.init_file.display()
            )));
        }
        for (module, path) in &self.modules {
            if !path.is_file() {
                return Err(EngineError::Init(format!(
                    "source of module {} not found at {}",
                    module,
                    path.display()
                )));
            }
        }

        let child = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Init(format!("cannot run {}: {}", self.binary.display(), e)))?;
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(EngineError::Timeout(self.timeout.as_secs())),
        };
        if !output.status.success() {
            return Err(EngineError::Init(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }

        info!(
            "SWI-Prolog ready ({}), {} module(s) available",
            String::from_utf8_lossy(&output.stdout).trim(),
            self.modules.len()
        );
        Ok(())
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    fn source_of(&self, module: &str) -> Result<&Path, EngineError> {
        self.modules
            .get(module)
            .map(PathBuf::as_path)
            .ok_or_else(|| EngineError::Query {
                module: module.to_string(),
                reason: "unknown module".to_string(),
            })
    }

    fn program(&self, module: &str, source: &Path, facts: &[Fact], goal: &Goal) -> String {
        let facts = facts.iter().map(Fact::as_str).collect::<Vec<_>>().join(", ");
        format!(
            r#":- use_module(library(http/json)).
:- consult('{init}').
:- use_module('{source}', []).

ra_expl(T, "_") :- var(T), !.
ra_expl(T, J) :- is_list(T), !, maplist(ra_expl, T, J).
ra_expl(T, S) :- term_string(T, S).

ra_main :-
    forall(member(F, [{facts}]), assertz({module}:F)),
    forall({module}:explain({goal}, Expl),
           ( ra_expl(Expl, J),
             term_string(Art, A), term_string(Right, R), term_string(Opt, O),
             json_write(current_output,
                        json([article=A, right=R, option=O, explanation=J]),
                        [width(0)]),
             nl )).

:- initialization(ra_main, main).
"#,
            init = prolog_path(&self.init_file),
            source = prolog_path(source),
            facts = facts,
            module = module,
            goal = goal.render(),
        )
    }

    /// Run `program` to completion. The script file lives until the child
    /// has exited; the child is killed when the deadline passes.
    async fn run(&self, module: &str, program: &str) -> Result<String, EngineError> {
        let mut script = tempfile::Builder::new()
            .prefix("rights_agency_")
            .suffix(".pl")
            .tempfile()?;
        script.write_all(program.as_bytes())?;
        script.flush()?;

        debug!("Running {} -q {}", self.binary.display(), script.path().display());
        let child = Command::new(&self.binary)
            .arg("-q")
            .arg(script.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("swipl exceeded {:?} in {}, killed", self.timeout, module);
                return Err(EngineError::Timeout(self.timeout.as_secs()));
            }
        };
        close_script(script);

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(EngineError::Query {
                module: module.to_string(),
                reason: truncate_text(stderr.trim(), TruncationPolicy::Bytes(2000)),
            });
        }
        if !stderr.trim().is_empty() {
            warn!("swipl stderr for {}: {}", module, truncate_text(stderr.trim(), TruncationPolicy::Bytes(500)));
        }
        Ok(stdout)
    }
}

fn close_script(script: NamedTempFile) {
    let path = script.path().to_path_buf();
    if let Err(e) = script.close() {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// Drive `future` to completion from a blocking worker: on the current
/// runtime when there is one, else on a private single-threaded runtime.
fn block_on<F: std::future::Future>(future: F) -> Result<F::Output, EngineError> {
    match Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => Ok(Builder::new_current_thread().enable_all().build()?.block_on(future)),
    }
}

impl LogicEngine for SwiplEngine {
    fn assert_fact(&self, module: &str, fact: &Fact) -> Result<(), EngineError> {
        self.source_of(module).map_err(|_| EngineError::Assert {
            module: module.to_string(),
            reason: "unknown module".to_string(),
        })?;
        let mut asserted = self.asserted.lock().unwrap_or_else(PoisonError::into_inner);
        asserted.entry(module.to_string()).or_default().push(fact.clone());
        Ok(())
    }

    fn retract_fact(&self, module: &str, fact: &Fact) -> Result<(), EngineError> {
        let mut asserted = self.asserted.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(facts) = asserted.get_mut(module) {
            facts.retain(|f| f != fact);
        }
        Ok(())
    }

    fn solve(&self, module: &str, goal: &Goal) -> Result<Vec<Solution>, EngineError> {
        let source = self.source_of(module)?;
        let facts = {
            let asserted = self.asserted.lock().unwrap_or_else(PoisonError::into_inner);
            asserted.get(module).cloned().unwrap_or_default()
        };
        let program = self.program(module, source, &facts, goal);
        let stdout = block_on(self.run(module, &program))??;
        parse_solutions(&stdout)
    }

    fn article_text(&self, module: &str, right: &str, article: &str) -> Result<Option<ArticleText>, EngineError> {
        let source = std::fs::read_to_string(self.source_of(module)?)?;
        Ok(parse_article_text(&source, right, article))
    }
}

/// One JSON object per line; anything else on stdout is ignored.
pub fn parse_solutions(stdout: &str) -> Result<Vec<Solution>, EngineError> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .map(|line| {
            serde_json::from_str::<Solution>(line)
                .map_err(|e| EngineError::Output(format!("{}: {}", e, truncate_text(line, TruncationPolicy::Bytes(200)))))
        })
        .collect()
}

fn prolog_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/").replace('\'', "\\'")
}

lazy_static! {
    static ref COMMENT_LINE: Regex = Regex::new(r"^%\s?(.*)$").unwrap();
}

/// Parse the annotation of `article` in a module source:
///
/// ```text
/// right_to_interpretation(_art2, ...) :- ...
/// %
/// % Title
/// % Body, possibly over several lines.
/// % $Editorial note$
/// ```
pub fn parse_article_text(source: &str, right: &str, article: &str) -> Option<ArticleText> {
    let head = Regex::new(&format!(r"^{}\(_{}\b.", regex::escape(right), regex::escape(article))).ok()?;
    let lines: Vec<&str> = source.lines().collect();
    let start = lines.iter().position(|line| head.is_match(line))?;
    if lines.get(start + 1).map(|l| l.trim()) != Some("%") {
        return None;
    }

    let block: Vec<&str> = lines[start + 2..]
        .iter()
        .map_while(|line| COMMENT_LINE.captures(line).and_then(|c| c.get(1)).map(|m| m.as_str().trim()))
        .collect();
    let (title, rest) = block.split_first()?;
    if title.is_empty() {
        return None;
    }

    let body = rest.join(" ");
    let (text, comment) = match body.split_once('$') {
        Some((text, note)) => {
            let note = note.split('$').next().unwrap_or_default().trim();
            (text, (!note.is_empty()).then(|| note.to_string()))
        }
        None => (body.as_str(), None),
    };
    Some(ArticleText {
        title: title.to_string(),
        text: text.split_whitespace().collect::<Vec<_>>().join(" "),
        comment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    const DIRECTIVE: &str = "directive_2012_13";

    fn config(kb_root: &Path) -> EngineConfig {
        EngineConfig {
            kb_root: kb_root.to_path_buf(),
            ..EngineConfig::default()
        }
    }

    /// Knowledge base with the directive module only.
    fn knowledge_base(source: &str) -> TempDir {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("my_init.pl"), "").unwrap();
        let module_dir = dir.path().join("directives").join(DIRECTIVE);
        std::fs::create_dir_all(&module_dir).unwrap();
        std::fs::write(module_dir.join(format!("{}.pl", DIRECTIVE)), source).unwrap();
        dir
    }

    /// Stand-in for `swipl` that answers `--version` and then runs `body`.
    #[cfg(unix)]
    fn fake_swipl(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("swipl");
        std::fs::write(
            &path,
            format!("#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo 'SWI-Prolog version 9.1.0'; exit 0; fi\n{}\n", body),
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    async fn engine_with(kb: &TempDir, body: &str, timeout_secs: u64) -> Arc<SwiplEngine> {
        let config = EngineConfig {
            swipl: fake_swipl(kb.path(), body),
            timeout_secs,
            ..config(kb.path())
        };
        Arc::new(SwiplEngine::from_config(&config, &[DIRECTIVE.to_string()], &[]).await.unwrap())
    }

    #[cfg(unix)]
    async fn solve_on_worker(engine: Arc<SwiplEngine>) -> Result<Vec<Solution>, EngineError> {
        tokio::task::spawn_blocking(move || engine.solve(DIRECTIVE, &Goal::has_right("dir").for_person(Some("p"))))
            .await
            .unwrap()
    }

    #[test]
    fn test_parse_solutions() {
        let stdout = concat!(
            "Warning: something\n",
            r#"{"article":"art3","right":"right_to_information","option":"remain_silent","explanation":["person_status(p,suspect)",["_"]]}"#,
            "\n\n"
        );
        let solutions = parse_solutions(stdout).unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].article, "art3");
        assert!(solutions[0].explanation.is_array());
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        assert!(matches!(parse_solutions("{\"article\": 3"), Err(EngineError::Output(_))));
    }

    #[test]
    fn test_article_text_from_annotations() {
        let source = "\
:- module(directive_2010_64, []).

right_to_interpretation(_art2, PersonId, questioning) :-
%
% Right to interpretation
% Member States shall ensure that suspected or accused persons
% who do not speak the language are provided with interpretation.
% $Applies from the first questioning by the police.$
    person_status(PersonId, suspect).

right_to_interpretation(_art21, PersonId, trial) :-
    person_status(PersonId, accused).
";
        let text = parse_article_text(source, "right_to_interpretation", "art2").unwrap();
        assert_eq!(text.title, "Right to interpretation");
        assert_eq!(
            text.text,
            "Member States shall ensure that suspected or accused persons who do not speak the language are provided with interpretation."
        );
        assert_eq!(text.comment.as_deref(), Some("Applies from the first questioning by the police."));

        assert!(parse_article_text(source, "right_to_interpretation", "art21").is_none());
        assert!(parse_article_text(source, "right_to_translation", "art2").is_none());
    }

    #[tokio::test]
    async fn test_missing_knowledge_base_fails_init() {
        let dir = tempdir().unwrap();
        let result = SwiplEngine::from_config(
            &config(dir.path()),
            &[DIRECTIVE.to_string()],
            &["pl".to_string()],
        )
        .await;
        assert!(matches!(result, Err(EngineError::Init(_))));
    }

    #[tokio::test]
    async fn test_missing_module_source_fails_init() {
        let kb = knowledge_base("");
        let result = SwiplEngine::from_config(
            &config(kb.path()),
            &[DIRECTIVE.to_string()],
            &["pl".to_string()],
        )
        .await;
        let Err(EngineError::Init(message)) = result else {
            panic!("expected init failure");
        };
        assert!(message.contains("polish_implementation.pl"));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_solve_runs_script_and_removes_it() {
        let kb = knowledge_base("");
        let seen = kb.path().join("script_path");
        let body = format!(
            "echo \"$2\" > '{}'\necho '{}'",
            seen.display(),
            r#"{"article":"art3","right":"right_to_information","option":"remain_silent","explanation":["person_status(p, suspect)"]}"#
        );
        let engine = engine_with(&kb, &body, 5).await;

        let solutions = solve_on_worker(engine).await.unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].right, "right_to_information");

        let script = std::fs::read_to_string(&seen).unwrap();
        assert!(script.trim().ends_with(".pl"));
        assert!(!Path::new(script.trim()).exists());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_solve_times_out() {
        let kb = knowledge_base("");
        let engine = engine_with(&kb, "sleep 5", 1).await;

        let started = std::time::Instant::now();
        let result = solve_on_worker(engine).await;
        assert!(matches!(result, Err(EngineError::Timeout(1))));
        assert!(started.elapsed() < std::time::Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_solve_reports_stderr() {
        let kb = knowledge_base("");
        let engine = engine_with(&kb, "echo 'existence error' >&2\nexit 1", 5).await;

        let Err(EngineError::Query { module, reason }) = solve_on_worker(engine).await else {
            panic!("expected query failure");
        };
        assert_eq!(module, DIRECTIVE);
        assert!(reason.contains("existence error"));
    }

    #[cfg(unix)]
    #[test]
    fn test_solve_without_runtime() {
        let kb = knowledge_base("");
        let body = format!(
            "echo '{}'",
            r#"{"article":"art3","right":"right_to_information","option":"remain_silent","explanation":[]}"#
        );
        let config = EngineConfig {
            swipl: fake_swipl(kb.path(), &body),
            ..config(kb.path())
        };
        let runtime = Builder::new_current_thread().enable_all().build().unwrap();
        let engine = runtime
            .block_on(SwiplEngine::from_config(&config, &[DIRECTIVE.to_string()], &[]))
            .unwrap();
        drop(runtime);

        let solutions = engine.solve(DIRECTIVE, &Goal::has_right("dir")).unwrap();
        assert_eq!(solutions.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_article_text_reads_module_source() {
        let kb = knowledge_base("right_to_information(_art3, P, remain_silent) :-\n%\n% Right to information\n% Suspects shall be informed promptly.\n    person_status(P, suspect).\n");
        let engine = engine_with(&kb, "exit 0", 5).await;

        let text = engine.article_text(DIRECTIVE, "right_to_information", "art3").unwrap().unwrap();
        assert_eq!(text.title, "Right to information");
        assert_eq!(text.text, "Suspects shall be informed promptly.");
        assert!(matches!(engine.article_text("unknown", "r", "art3"), Err(EngineError::Query { .. })));
    }
}
