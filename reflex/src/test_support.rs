//! Test-only fakes and a throwaway engine root.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;

use crate::core::types::VerificationResult;
use crate::io::config::EngineConfig;
use crate::io::export::Confirm;
use crate::io::failure_log::FailureLog;
use crate::io::git::Identity;
use crate::io::model::{ModelClient, ModelError, Provider};
use crate::io::paths::EnginePaths;
use crate::io::verify::Verifier;

/// Verifier that replays scripted results, then repeats `fallback`.
pub struct ScriptedVerifier {
    script: RefCell<VecDeque<VerificationResult>>,
    fallback: VerificationResult,
    calls: Cell<u32>,
}

impl ScriptedVerifier {
    pub fn new(script: Vec<VerificationResult>, fallback: VerificationResult) -> Self {
        Self {
            script: RefCell::new(script.into()),
            fallback,
            calls: Cell::new(0),
        }
    }

    /// Every run fails with the same output.
    pub fn always_failing(output: &str) -> Self {
        Self::new(Vec::new(), VerificationResult::failed(Some(1), output))
    }

    pub fn always_passing() -> Self {
        Self::new(Vec::new(), VerificationResult::passed("1 passed"))
    }

    /// Fail `failures` times, then pass forever.
    pub fn passing_after(failures: u32, output: &str) -> Self {
        let script = (0..failures)
            .map(|_| VerificationResult::failed(Some(1), output))
            .collect();
        Self::new(script, VerificationResult::passed("1 passed"))
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl Verifier for ScriptedVerifier {
    fn verify(&self, _target: &Path) -> VerificationResult {
        self.calls.set(self.calls.get() + 1);
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Model that replays scripted replies and records every prompt.
///
/// Once the script is used up it answers with `fallback`, or with a missing
/// credential error when there is none.
pub struct ScriptedModel {
    script: RefCell<VecDeque<Result<String, ModelError>>>,
    fallback: Option<String>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<String, ModelError>>, fallback: Option<String>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            fallback,
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(Vec::new(), Some(text.to_string()))
    }

    /// Every call fails as if no API key were configured.
    pub fn without_credentials() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

pub fn missing_credential() -> ModelError {
    ModelError::MissingCredential {
        provider: Provider::Gemini,
        env_var: Provider::Gemini.api_key_env(),
    }
}

impl ModelClient for ScriptedModel {
    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        if let Some(next) = self.script.borrow_mut().pop_front() {
            return next;
        }
        self.fallback.clone().ok_or_else(missing_credential)
    }
}

/// Confirmation that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirm(pub bool);

impl Confirm for FixedConfirm {
    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(self.0)
    }
}

/// Commit identity for tests that create git history.
pub fn test_identity() -> Identity {
    Identity {
        name: "Reflex Test".to_string(),
        email: "reflex@example.com".to_string(),
    }
}

pub const BUGGY_MAIN: &str = "def add(a, b):\n    return a - b\n";

/// Engine root in a temp dir with the default layout populated.
pub struct TestEngine {
    _temp: TempDir,
    pub cfg: EngineConfig,
    pub paths: EnginePaths,
}

impl TestEngine {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut cfg = EngineConfig {
            max_retries: 3,
            retry_delay_ms: 0,
            ..EngineConfig::default()
        };
        cfg.export.author_name = Some(test_identity().name);
        cfg.export.author_email = Some(test_identity().email);
        let paths = EnginePaths::new(temp.path(), &cfg.paths);

        fs::create_dir_all(&paths.project_dir).expect("project dir");
        fs::create_dir_all(&paths.guidelines_dir).expect("guidelines dir");
        fs::write(&paths.target_file, BUGGY_MAIN).expect("target");
        fs::write(paths.project_dir.join("test_main.py"), "from main import add\n")
            .expect("test file");
        fs::write(&paths.system_prompt, "Write careful code.\n").expect("system prompt");
        fs::write(
            paths.guideline(&cfg.improve.guideline),
            "# Development Standards\n\nKeep functions small.\n",
        )
        .expect("guideline");
        if let Some(parent) = paths.prd.parent() {
            fs::create_dir_all(parent).expect("prd dir");
        }
        fs::write(&paths.prd, "# Product\n\nAn adder.\n").expect("prd");

        Self {
            _temp: temp,
            cfg,
            paths,
        }
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    pub fn log(&self) -> FailureLog {
        FailureLog::new(&self.paths.log_file)
    }

    pub fn read_target(&self) -> String {
        fs::read_to_string(&self.paths.target_file).expect("read target")
    }

    pub fn guideline_text(&self) -> String {
        fs::read_to_string(self.paths.guideline(&self.cfg.improve.guideline))
            .expect("read guideline")
    }

    /// A path under the engine root, outside the project directory.
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}
