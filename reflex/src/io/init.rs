//! Scaffolding for a fresh engine root (`reflex init`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::io::config::{EngineConfig, save_config};
use crate::io::paths::EnginePaths;
use crate::io::workspace::GITKEEP;

const SYSTEM_PROMPT_PLACEHOLDER: &str = "# System Prompt\n\nDescribe how the model should behave when it patches the project.\n";
const GUIDELINE_PLACEHOLDER: &str = "# Development Standards\n\nList the rules every patch must follow.\n";
const PRD_PLACEHOLDER: &str = "# Product Requirements\n\nDescribe what the project should do.\n";

/// Options for `init_engine`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Rewrite the config file with defaults even if it exists.
    pub force: bool,
}

/// What `init_engine` wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub config_written: bool,
    /// Documents created because they were missing.
    pub created: Vec<String>,
}

/// Create the engine layout under `paths.root`.
///
/// Existing documents are never overwritten; `options.force` only replaces
/// the config file.
pub fn init_engine(
    paths: &EnginePaths,
    config_path: &Path,
    cfg: &EngineConfig,
    options: &InitOptions,
) -> Result<InitReport> {
    if config_path.exists() && !config_path.is_file() {
        return Err(anyhow!(
            "reflex init: {} exists but is not a file",
            config_path.display()
        ));
    }
    let config_written = options.force || !config_path.exists();
    if config_written {
        save_config(config_path, &EngineConfig::default())?;
    }

    let mut created = Vec::new();
    create_dir(&paths.project_dir)?;
    create_dir(&paths.guidelines_dir)?;
    let documents = [
        (paths.project_dir.join(GITKEEP), ""),
        (paths.system_prompt.clone(), SYSTEM_PROMPT_PLACEHOLDER),
        (paths.guideline(&cfg.improve.guideline), GUIDELINE_PLACEHOLDER),
        (paths.prd.clone(), PRD_PLACEHOLDER),
    ];
    for (path, contents) in &documents {
        if path.exists() {
            continue;
        }
        if let Some(parent) = path.parent() {
            create_dir(parent)?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
        let shown = path.strip_prefix(paths.root()).unwrap_or(path.as_path());
        created.push(shown.display().to_string());
    }
    debug!(config_written, created = created.len(), "engine initialized");

    Ok(InitReport {
        config_written,
        created,
    })
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::{CONFIG_FILE, load_config};

    fn engine(root: &Path) -> (EnginePaths, EngineConfig) {
        let cfg = EngineConfig::default();
        (EnginePaths::new(root, &cfg.paths), cfg)
    }

    #[test]
    fn creates_layout_and_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (paths, cfg) = engine(temp.path());
        let config_path = temp.path().join(CONFIG_FILE);

        let report = init_engine(&paths, &config_path, &cfg, &InitOptions { force: false })
            .expect("init");

        assert!(report.config_written);
        assert_eq!(report.created.len(), 4);
        assert_eq!(load_config(&config_path).expect("load"), EngineConfig::default());
        assert!(paths.project_dir.join(GITKEEP).is_file());
        assert!(paths.guideline("development_standards.md").is_file());
        assert!(paths.prd.is_file());
    }

    #[test]
    fn keeps_existing_documents_and_config_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (paths, cfg) = engine(temp.path());
        let config_path = temp.path().join(CONFIG_FILE);
        fs::write(&config_path, "max_retries = 9\n").expect("config");
        fs::write(&paths.system_prompt, "mine").expect("prompt");

        let report = init_engine(&paths, &config_path, &cfg, &InitOptions { force: false })
            .expect("init");

        assert!(!report.config_written);
        assert!(!report.created.contains(&"system_prompt.md".to_string()));
        assert_eq!(fs::read_to_string(&paths.system_prompt).expect("read"), "mine");
        assert_eq!(load_config(&config_path).expect("load").max_retries, 9);
    }

    #[test]
    fn force_resets_config_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (paths, cfg) = engine(temp.path());
        let config_path = temp.path().join(CONFIG_FILE);
        fs::write(&config_path, "max_retries = 9\n").expect("config");
        fs::write(&paths.system_prompt, "mine").expect("prompt");

        let report =
            init_engine(&paths, &config_path, &cfg, &InitOptions { force: true }).expect("init");

        assert!(report.config_written);
        assert_eq!(load_config(&config_path).expect("load").max_retries, 3);
        assert_eq!(fs::read_to_string(&paths.system_prompt).expect("read"), "mine");
    }
}
