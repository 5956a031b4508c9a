//! Resolved filesystem layout of an engine root.

use std::path::{Path, PathBuf};

use crate::io::config::PathsConfig;

/// All canonical paths for an engine root.
#[derive(Debug, Clone)]
pub struct EnginePaths {
    pub root: PathBuf,
    pub project_dir: PathBuf,
    pub target_file: PathBuf,
    pub guidelines_dir: PathBuf,
    pub system_prompt: PathBuf,
    pub log_file: PathBuf,
    pub prd: PathBuf,
}

impl EnginePaths {
    pub fn new(root: impl Into<PathBuf>, cfg: &PathsConfig) -> Self {
        let root = root.into();
        let project_dir = root.join(&cfg.project_dir);
        Self {
            target_file: project_dir.join(&cfg.target_file),
            project_dir,
            guidelines_dir: root.join(&cfg.guidelines_dir),
            system_prompt: root.join(&cfg.system_prompt),
            log_file: root.join(&cfg.log_file),
            prd: root.join(&cfg.prd),
            root,
        }
    }

    /// Path of a guideline document by file name.
    pub fn guideline(&self, name: &str) -> PathBuf {
        self.guidelines_dir.join(name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
