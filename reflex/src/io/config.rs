//! Engine configuration stored in `reflex.toml` at the engine root.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::io::model::Provider;

/// Default config file name, resolved against the engine root.
pub const CONFIG_FILE: &str = "reflex.toml";

/// Engine configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values the
/// engine ships with, so an absent file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Patch attempts per heal run (the baseline is not counted).
    pub max_retries: u32,

    /// Heal rounds attempted by `reflex develop` before giving up.
    pub max_develop_attempts: u32,

    /// Pause between develop rounds, in milliseconds.
    pub retry_delay_ms: u64,

    /// Task used when `heal`/`develop` are invoked without one.
    pub default_task: String,

    pub paths: PathsConfig,
    pub verify: VerifyConfig,
    pub model: ModelConfig,
    pub improve: ImproveConfig,
    pub export: ExportConfig,
}

/// Layout of the engine root. Relative paths are resolved against the root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub project_dir: String,
    /// File inside `project_dir` that patches overwrite.
    pub target_file: String,
    pub guidelines_dir: String,
    pub system_prompt: String,
    pub log_file: String,
    /// Product requirements document `develop` refuses to run without.
    pub prd: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VerifyConfig {
    /// Verification argv; the project directory is appended as the last argument.
    pub command: Vec<String>,

    /// Kill the verification command after this many seconds. Unset means wait
    /// for it to exit.
    pub timeout_secs: Option<u64>,

    /// Keep at most this many bytes of stdout and of stderr.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: Provider,
    /// Model name; each provider falls back to its own default when unset.
    pub model: Option<String>,
    pub temperature: f32,
    /// Completion cap for providers that require one.
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImproveConfig {
    /// Guideline file (inside `guidelines_dir`) rewritten by `reflex improve`.
    pub guideline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportConfig {
    /// File/directory names skipped when exporting, as shell globs (`*`, `?`, `[...]`).
    pub ignore: Vec<String>,
    pub commit_message: String,
    /// Commit identity for the exported repository. Falls back to git's own
    /// configuration when unset.
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_develop_attempts: 5,
            retry_delay_ms: 2_000,
            default_task: "Fix the bug in the `add` function in `project/main.py`.".to_string(),
            paths: PathsConfig::default(),
            verify: VerifyConfig::default(),
            model: ModelConfig::default(),
            improve: ImproveConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            project_dir: "project".to_string(),
            target_file: "main.py".to_string(),
            guidelines_dir: "guidelines".to_string(),
            system_prompt: "system_prompt.md".to_string(),
            log_file: "engine_log.csv".to_string(),
            prd: "user_input/prd_template.md".to_string(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            command: vec!["python3".to_string(), "-m".to_string(), "pytest".to_string()],
            timeout_secs: None,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: None,
            temperature: 0.7,
            max_tokens: 4_000,
        }
    }
}

impl Default for ImproveConfig {
    fn default() -> Self {
        Self {
            guideline: "development_standards.md".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ignore: [
                "__pycache__",
                "*.pyc",
                ".gitkeep",
                "main.py",
                "requirements.txt",
                "test_main.py",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            commit_message: "Initial commit: Project exported from engine.".to_string(),
            author_name: None,
            author_email: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(anyhow!("max_retries must be > 0"));
        }
        if self.max_develop_attempts == 0 {
            return Err(anyhow!("max_develop_attempts must be > 0"));
        }
        if self.verify.command.is_empty() || self.verify.command[0].trim().is_empty() {
            return Err(anyhow!("verify.command must be a non-empty array"));
        }
        if self.verify.timeout_secs == Some(0) {
            return Err(anyhow!("verify.timeout_secs must be > 0 when set"));
        }
        if self.verify.output_limit_bytes == 0 {
            return Err(anyhow!("verify.output_limit_bytes must be > 0"));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(anyhow!("model.temperature must be within 0.0..=2.0"));
        }
        for (name, value) in [
            ("paths.project_dir", &self.paths.project_dir),
            ("paths.target_file", &self.paths.target_file),
            ("paths.guidelines_dir", &self.paths.guidelines_dir),
            ("paths.system_prompt", &self.paths.system_prompt),
            ("paths.log_file", &self.paths.log_file),
            ("improve.guideline", &self.improve.guideline),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} must not be empty"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Validate and write config as TOML, replacing `path` atomically.
///
/// The file is written to a temp file in the same directory and renamed into
/// place, so readers never see a partial config.
pub fn save_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp config in {}", parent.display()))?;
    tmp.write_all(buf.as_bytes())
        .with_context(|| format!("write temp config {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
