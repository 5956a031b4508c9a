//! Guideline improver for `reflex improve` and between `develop` rounds.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

use crate::io::config::ImproveConfig;
use crate::io::context::read_or_placeholder;
use crate::io::failure_log::FailureLog;
use crate::io::model::ModelClient;
use crate::io::paths::EnginePaths;
use crate::io::prompt::{GuidelinePrompt, PromptEngine};

/// Result of a successful guideline rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImproveOutcome {
    pub guideline: PathBuf,
    /// The dominant error the rewrite targets.
    pub error: String,
}

/// Rewrite the configured guideline so it addresses the most frequent error
/// in the failure log.
///
/// Nothing is sent to the model unless the log has at least one record and
/// the guidelines directory exists. The model's reply replaces the guideline
/// verbatim; on a model fault the guideline is left as it was.
#[instrument(skip_all, fields(guideline = %cfg.guideline))]
pub fn improve_guidelines<M: ModelClient + ?Sized>(
    paths: &EnginePaths,
    cfg: &ImproveConfig,
    model: &M,
) -> Result<ImproveOutcome> {
    println!("--- Running guideline improvement ---");
    let log = FailureLog::new(&paths.log_file);
    if !log.exists() {
        return Err(anyhow!(
            "failure log {} not found; run the heal loop first",
            paths.log_file.display()
        ));
    }
    let error = log
        .most_common_error()?
        .ok_or_else(|| anyhow!("failure log {} has no records", paths.log_file.display()))?;
    if !paths.guidelines_dir.is_dir() {
        return Err(anyhow!(
            "guidelines directory {} not found",
            paths.guidelines_dir.display()
        ));
    }
    println!("Most common error:\n{error}");

    let guideline = paths.guideline(&cfg.guideline);
    let shown_path = guideline
        .strip_prefix(paths.root())
        .unwrap_or(&guideline)
        .display()
        .to_string();
    let current = read_or_placeholder(&guideline);
    let prompt = PromptEngine::new().render_guideline(&GuidelinePrompt {
        error: &error,
        guideline_path: &shown_path,
        guideline: &current,
    })?;

    let rewritten = model
        .generate(&prompt)
        .context("request guideline rewrite")?;
    fs::write(&guideline, &rewritten)
        .with_context(|| format!("write {}", guideline.display()))?;
    println!("Updated {shown_path}.");
    info!(bytes = rewritten.len(), "guideline rewritten");

    Ok(ImproveOutcome { guideline, error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedModel, TestEngine};

    #[test]
    fn rewrites_guideline_for_dominant_error() {
        let engine = TestEngine::new();
        let log = engine.log();
        log.append("t", 0, "E1").expect("append");
        log.append("t", 1, "E2").expect("append");
        log.append("t", 2, "E1").expect("append");
        let model = ScriptedModel::replying("```markdown\n# New standards\n```");

        let outcome =
            improve_guidelines(&engine.paths, &engine.cfg.improve, &model).expect("improve");

        assert_eq!(outcome.error, "E1");
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("E1"));
        assert!(prompts[0].contains("Keep functions small."));
        assert!(prompts[0].contains("guidelines/development_standards.md"));
        // Written as returned, fence included.
        assert_eq!(engine.guideline_text(), "```markdown\n# New standards\n```");
    }

    #[test]
    fn missing_log_is_an_error_without_model_call() {
        let engine = TestEngine::new();
        let model = ScriptedModel::replying("unused");

        let err = improve_guidelines(&engine.paths, &engine.cfg.improve, &model).unwrap_err();

        assert!(err.to_string().contains("not found"));
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn header_only_log_is_an_error_without_model_call() {
        let engine = TestEngine::new();
        fs::write(&engine.paths.log_file, "timestamp,task,attempt,error_output\n")
            .expect("header");
        let model = ScriptedModel::replying("unused");

        let err = improve_guidelines(&engine.paths, &engine.cfg.improve, &model).unwrap_err();

        assert!(err.to_string().contains("no records"));
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn model_failure_leaves_guideline_untouched() {
        let engine = TestEngine::new();
        engine.log().append("t", 0, "E1").expect("append");
        let before = engine.guideline_text();
        let model = ScriptedModel::without_credentials();

        let err = improve_guidelines(&engine.paths, &engine.cfg.improve, &model).unwrap_err();

        assert!(format!("{err:#}").contains("API key"));
        assert_eq!(engine.guideline_text(), before);
    }

    #[test]
    fn missing_guidelines_dir_is_an_error() {
        let engine = TestEngine::new();
        engine.log().append("t", 0, "E1").expect("append");
        fs::remove_dir_all(&engine.paths.guidelines_dir).expect("remove");
        let model = ScriptedModel::replying("unused");

        let err = improve_guidelines(&engine.paths, &engine.cfg.improve, &model).unwrap_err();

        assert!(err.to_string().contains("guidelines directory"));
        assert_eq!(model.calls(), 0);
    }
}
