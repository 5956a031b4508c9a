//! Self-healing development loop CLI.
//!
//! Runs a project's verification command, asks a language model to repair the
//! target file when it fails, and learns from repeated failures by rewriting
//! guideline documents.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use reflex::develop::{DevelopOutcome, DevelopRound, Improvement, run_develop};
use reflex::exit_codes;
use reflex::heal::run_heal;
use reflex::improve::improve_guidelines;
use reflex::io::config::{CONFIG_FILE, EngineConfig, load_config};
use reflex::io::export::{ExportOutcome, ExportRequest, StdinConfirm, export_project};
use reflex::io::init::{InitOptions, init_engine};
use reflex::io::model::{ModelClient, ModelSettings, build_client};
use reflex::io::paths::EnginePaths;
use reflex::io::verify::CommandVerifier;
use reflex::io::workspace::{ClearOutcome, ImportSource, clear_project, import_project};
use reflex::logging;

#[derive(Parser)]
#[command(
    name = "reflex",
    version,
    about = "Self-healing development loop driven by a language model"
)]
struct Cli {
    /// Engine root holding the project, guidelines and failure log.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to `<root>/reflex.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `reflex.toml`, the project directory and starter documents.
    Init {
        /// Rewrite an existing config file with defaults.
        #[arg(short, long)]
        force: bool,
    },
    /// Heal the project in rounds, improving guidelines between failed rounds,
    /// then export it.
    Develop {
        /// Where the finished project is exported (replaced if it exists).
        export_dest: PathBuf,
        /// Task description sent to the model.
        #[arg(long)]
        task: Option<String>,
    },
    /// Empty the project directory, keeping a `.gitkeep`.
    Clear,
    /// Replace the project with a git repository (URL) or a local directory.
    Import { source: String },
    /// Run one self-healing loop against the project.
    Heal {
        /// Task description sent to the model.
        task: Option<String>,
    },
    /// Rewrite a guideline to target the most frequent logged error.
    Improve,
    /// Copy the project to a destination with a fresh git history.
    Export {
        dest: PathBuf,
        /// Overwrite an existing destination without asking.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are not errors.
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            err.print().ok();
            std::process::exit(code);
        }
    };
    logging::init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join(CONFIG_FILE));
    let cfg = load_config(&config_path)?;
    let paths = EnginePaths::new(&cli.root, &cfg.paths);

    match cli.command {
        Command::Init { force } => cmd_init(&paths, &config_path, &cfg, force),
        Command::Develop { export_dest, task } => {
            let task = task.unwrap_or_else(|| cfg.default_task.clone());
            cmd_develop(&paths, &cfg, &task, &export_dest)
        }
        Command::Clear => cmd_clear(&paths),
        Command::Import { source } => cmd_import(&paths, &source),
        Command::Heal { task } => {
            let task = task.unwrap_or_else(|| cfg.default_task.clone());
            cmd_heal(&paths, &cfg, &task)
        }
        Command::Improve => cmd_improve(&paths, &cfg),
        Command::Export { dest, force } => cmd_export(&paths, &cfg, &dest, force),
    }
}

fn cmd_init(
    paths: &EnginePaths,
    config_path: &Path,
    cfg: &EngineConfig,
    force: bool,
) -> Result<i32> {
    let report = init_engine(paths, config_path, cfg, &InitOptions { force })?;
    if report.config_written {
        println!("Wrote {}.", config_path.display());
    }
    for created in &report.created {
        println!("Created {created}.");
    }
    Ok(exit_codes::OK)
}

fn model_client(cfg: &EngineConfig) -> Result<Box<dyn ModelClient>> {
    let settings = ModelSettings::from_env(&cfg.model)?;
    println!("Using {} ({})", settings.provider, settings.model);
    build_client(&settings)
}

fn cmd_develop(paths: &EnginePaths, cfg: &EngineConfig, task: &str, dest: &Path) -> Result<i32> {
    let model = model_client(cfg)?;
    let verifier = CommandVerifier::new(paths.root(), &cfg.verify);
    let outcome = run_develop(
        paths,
        cfg,
        task,
        dest,
        &verifier,
        model.as_ref(),
        &StdinConfirm,
        print_round,
    )?;

    match outcome {
        DevelopOutcome::Completed { rounds, export } => {
            println!("\nProject healed in round {rounds}.");
            Ok(report_export(&export, dest))
        }
        DevelopOutcome::Exhausted { rounds } => {
            println!("Could not heal the project in {rounds} rounds.");
            Ok(exit_codes::INVALID)
        }
    }
}

fn print_round(round: &DevelopRound) {
    let summary = match &round.improvement {
        None => "healed".to_string(),
        Some(Improvement::Applied) => "failed, guidelines improved".to_string(),
        Some(Improvement::Failed(err)) => format!("failed, improvement failed: {err}"),
        Some(Improvement::Skipped) => "failed, nothing to learn from".to_string(),
    };
    println!(
        "Round {}: {} ({} verifications, {} patches)",
        round.round, summary, round.heal.verifications, round.heal.patches
    );
}

fn cmd_clear(paths: &EnginePaths) -> Result<i32> {
    match clear_project(&paths.project_dir)? {
        ClearOutcome::Cleared { removed } => {
            println!(
                "Cleared {} ({removed} entries removed).",
                paths.project_dir.display()
            );
        }
        ClearOutcome::Missing => {
            println!(
                "Project folder not found at {}. Nothing to clear.",
                paths.project_dir.display()
            );
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_import(paths: &EnginePaths, source: &str) -> Result<i32> {
    let source = ImportSource::parse(source)?;
    import_project(&source, &paths.project_dir)?;
    println!("Project imported into {}.", paths.project_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_heal(paths: &EnginePaths, cfg: &EngineConfig, task: &str) -> Result<i32> {
    let model = model_client(cfg)?;
    let verifier = CommandVerifier::new(paths.root(), &cfg.verify);
    let outcome = run_heal(paths, cfg.max_retries, task, &verifier, model.as_ref())?;
    if outcome.succeeded() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::EXHAUSTED)
    }
}

fn cmd_improve(paths: &EnginePaths, cfg: &EngineConfig) -> Result<i32> {
    let model = model_client(cfg)?;
    let outcome = improve_guidelines(paths, &cfg.improve, model.as_ref())?;
    println!("Guideline updated: {}", outcome.guideline.display());
    Ok(exit_codes::OK)
}

fn cmd_export(paths: &EnginePaths, cfg: &EngineConfig, dest: &Path, force: bool) -> Result<i32> {
    let request = ExportRequest::new(&paths.project_dir, dest, force, &cfg.export);
    let outcome = export_project(&request, &StdinConfirm)?;
    Ok(report_export(&outcome, dest))
}

fn report_export(outcome: &ExportOutcome, dest: &Path) -> i32 {
    match outcome {
        ExportOutcome::Exported { files, committed } => {
            if *committed {
                println!("Exported {files} files to {}.", dest.display());
            } else {
                println!(
                    "Exported {files} files to {} (nothing to commit).",
                    dest.display()
                );
            }
            exit_codes::OK
        }
        ExportOutcome::Cancelled => {
            println!("Export cancelled.");
            exit_codes::CANCELLED
        }
        ExportOutcome::HistoryFailed { files, error } => {
            eprintln!(
                "Copied {files} files to {} but git failed: {error}",
                dest.display()
            );
            exit_codes::INVALID
        }
    }
}
