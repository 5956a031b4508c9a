//! Project export: copy the workspace to a destination with a fresh git history.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};

use crate::io::config::ExportConfig;
use crate::io::git::{Git, Identity};
use crate::io::workspace::copy_dir_contents;

/// Asks the user a yes/no question.
pub trait Confirm {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Prompts on stdout and reads one answer line from stdin; only `y` confirms.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> Result<bool> {
        print!("{question} (y/n): ");
        std::io::stdout().flush().context("flush stdout")?;
        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("read answer")?;
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }
}

/// Parameters for an export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Replace an existing destination without asking.
    pub force: bool,
    pub ignore: Vec<String>,
    pub commit_message: String,
    pub identity: Option<Identity>,
}

impl ExportRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        force: bool,
        cfg: &ExportConfig,
    ) -> Self {
        let identity = match (&cfg.author_name, &cfg.author_email) {
            (Some(name), Some(email)) => Some(Identity {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        };
        Self {
            source: source.into(),
            destination: destination.into(),
            force,
            ignore: cfg.ignore.clone(),
            commit_message: cfg.commit_message.clone(),
            identity,
        }
    }
}

/// Result of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Files copied and history created. `committed` is false when every file
    /// was ignored and there was nothing to commit.
    Exported { files: usize, committed: bool },
    /// The destination existed and the user declined to overwrite it.
    Cancelled,
    /// Files were copied but git failed; the copy is left in place.
    HistoryFailed { files: usize, error: String },
}

/// Copy the project to `request.destination` and give it a one-commit history.
#[instrument(skip_all, fields(destination = %request.destination.display(), force = request.force))]
pub fn export_project<C: Confirm + ?Sized>(
    request: &ExportRequest,
    confirm: &C,
) -> Result<ExportOutcome> {
    if !request.source.is_dir() {
        return Err(anyhow!(
            "source directory '{}' not found",
            request.source.display()
        ));
    }

    let dest = &request.destination;
    if dest.exists() {
        if request.force {
            warn!("destination exists, forcing overwrite");
        } else {
            let question = format!(
                "Warning: Destination '{}' already exists. Overwrite?",
                dest.display()
            );
            if !confirm.confirm(&question)? {
                info!("export cancelled");
                return Ok(ExportOutcome::Cancelled);
            }
        }
        remove_path(dest)?;
    }

    println!("\n> Exporting project to {}...", dest.display());
    fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
    let files = copy_dir_contents(&request.source, dest, &request.ignore)?;
    println!("> Project files copied successfully.");

    match init_history(dest, request) {
        Ok(committed) => {
            info!(files, committed, "export complete");
            Ok(ExportOutcome::Exported { files, committed })
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "git initialization failed");
            Ok(ExportOutcome::HistoryFailed {
                files,
                error: format!("{err:#}"),
            })
        }
    }
}

fn init_history(dest: &Path, request: &ExportRequest) -> Result<bool> {
    let git = Git::new(dest).with_identity(request.identity.clone());
    println!("> Initializing new Git repository in {}...", dest.display());
    git.init()?;
    println!("> Creating initial commit...");
    git.add_all()?;
    git.commit_staged(&request.commit_message)
}

fn remove_path(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path).with_context(|| format!("remove {}", path.display()))
    } else {
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))
    }
}
