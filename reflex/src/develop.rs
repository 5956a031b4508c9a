//! Orchestrator for `reflex develop`: heal rounds, guideline improvement
//! between them, and export on success.

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::types::HealOutcome;
use crate::heal::run_heal;
use crate::improve::improve_guidelines;
use crate::io::config::EngineConfig;
use crate::io::export::{Confirm, ExportOutcome, ExportRequest, export_project};
use crate::io::failure_log::FailureLog;
use crate::io::model::ModelClient;
use crate::io::paths::EnginePaths;
use crate::io::verify::Verifier;

/// What happened after a heal round failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Improvement {
    /// The guideline was rewritten.
    Applied,
    /// The improver ran and failed; the next round uses the old guidelines.
    Failed(String),
    /// The log had no records to learn from.
    Skipped,
}

/// Report for one heal round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevelopRound {
    pub round: u32,
    pub heal: HealOutcome,
    /// `None` when the round succeeded.
    pub improvement: Option<Improvement>,
}

/// Terminal state of a develop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevelopOutcome {
    /// A round healed the project and the export step ran.
    Completed { rounds: u32, export: ExportOutcome },
    /// Every round was used without a passing verification.
    Exhausted { rounds: u32 },
}

/// Run heal rounds until one succeeds or `max_develop_attempts` is used up,
/// then export the project to `export_dest`, replacing whatever is there.
///
/// The failure log is removed first so every run starts from a clean history.
/// `on_round` sees each round as it finishes.
#[instrument(skip_all, fields(export_dest = %export_dest.display()))]
#[allow(clippy::too_many_arguments)]
pub fn run_develop<V, M, C, F>(
    paths: &EnginePaths,
    cfg: &EngineConfig,
    task: &str,
    export_dest: &Path,
    verifier: &V,
    model: &M,
    confirm: &C,
    mut on_round: F,
) -> Result<DevelopOutcome>
where
    V: Verifier + ?Sized,
    M: ModelClient + ?Sized,
    C: Confirm + ?Sized,
    F: FnMut(&DevelopRound),
{
    if !paths.prd.is_file() {
        return Err(anyhow!("PRD file not found at {}", paths.prd.display()));
    }
    println!("--- Starting development run ---");
    println!("PRD: {}", paths.prd.display());
    println!("Export destination: {}", export_dest.display());

    let log = FailureLog::new(&paths.log_file);
    log.remove()?;

    let max_rounds = cfg.max_develop_attempts;
    for round in 1..=max_rounds {
        println!("\n=== Development round {round} of {max_rounds} ===");
        let heal = run_heal(paths, cfg.max_retries, task, verifier, model)?;

        if heal.succeeded() {
            info!(round, "project healed");
            on_round(&DevelopRound {
                round,
                heal,
                improvement: None,
            });
            println!("\n--- Exporting final project ---");
            let request = ExportRequest::new(&paths.project_dir, export_dest, true, &cfg.export);
            let export = export_project(&request, confirm)?;
            return Ok(DevelopOutcome::Completed {
                rounds: round,
                export,
            });
        }

        let improvement = if log.has_records() {
            match improve_guidelines(paths, &cfg.improve, model) {
                Ok(_) => Improvement::Applied,
                Err(err) => {
                    warn!(round, err = %format!("{err:#}"), "guideline improvement failed");
                    println!("Guideline improvement failed: {err:#}. Retrying without it.");
                    Improvement::Failed(format!("{err:#}"))
                }
            }
        } else {
            println!("No failure records to learn from. Retrying directly.");
            Improvement::Skipped
        };
        on_round(&DevelopRound {
            round,
            heal,
            improvement: Some(improvement),
        });

        if round < max_rounds && cfg.retry_delay_ms > 0 {
            thread::sleep(Duration::from_millis(cfg.retry_delay_ms));
        }
    }

    println!("\n--- Development failed after {max_rounds} rounds ---");
    Ok(DevelopOutcome::Exhausted { rounds: max_rounds })
}
