//! Self-healing retry loop for `reflex heal` and each `develop` round.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::types::{HealOutcome, HealStop};
use crate::io::context::{build_context, read_or_placeholder};
use crate::io::failure_log::FailureLog;
use crate::io::model::ModelClient;
use crate::io::patch::apply_patch;
use crate::io::paths::EnginePaths;
use crate::io::prompt::{PatchPrompt, PromptEngine};
use crate::io::verify::Verifier;

/// Written to the target file when the model could not be reached, so the
/// next verification still runs against a defined file.
pub const MODEL_FAILURE_PLACEHOLDER: &str = "Error: AI model call failed. Check logs for details.";

/// Verify the project, and on failure ask the model for a replacement target
/// file, up to `max_retries` times.
///
/// A failing baseline is logged as attempt 0; each failing attempt `i` is logged
/// after its patch is applied. Model faults are absorbed; filesystem faults
/// (missing guidelines directory, unwritable target or log) are returned.
#[instrument(skip_all, fields(max_retries))]
pub fn run_heal<V, M>(
    paths: &EnginePaths,
    max_retries: u32,
    task: &str,
    verifier: &V,
    model: &M,
) -> Result<HealOutcome>
where
    V: Verifier + ?Sized,
    M: ModelClient + ?Sized,
{
    let context = build_context(paths).context("assemble prompt context")?;
    let prompts = PromptEngine::new();
    let log = FailureLog::new(&paths.log_file);
    let shown_path = paths
        .target_file
        .strip_prefix(paths.root())
        .unwrap_or(&paths.target_file)
        .display()
        .to_string();

    println!("--- Running self-healing loop for task: {task} ---");

    let baseline = verifier.verify(&paths.project_dir);
    let mut verifications = 1u32;
    let mut patches = 0u32;
    if baseline.success {
        println!("Initial verification passed. Nothing to heal.");
        return Ok(HealOutcome {
            stop: HealStop::Succeeded { attempt: 0 },
            verifications,
            patches,
        });
    }
    println!("Initial verification failed. Starting the healing process.");
    log.append(task, 0, &baseline.output)?;

    for attempt in 1..=max_retries {
        println!("\n--- Attempt {attempt} of {max_retries} ---");
        let result = verifier.verify(&paths.project_dir);
        verifications += 1;
        if result.success {
            println!("\n--- Verification succeeded ---");
            info!(attempt, "heal succeeded");
            return Ok(HealOutcome {
                stop: HealStop::Succeeded { attempt },
                verifications,
                patches,
            });
        }

        let code = read_or_placeholder(&paths.target_file);
        let prompt = prompts.render_patch(&PatchPrompt {
            context: &context,
            task,
            file_path: &shown_path,
            code: &code,
            error: &result.output,
        })?;

        println!("Requesting a patch from the model...");
        patches += 1;
        let reply = match model.generate(&prompt) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(attempt, err = %err, "model call failed");
                MODEL_FAILURE_PLACEHOLDER.to_string()
            }
        };
        apply_patch(&paths.target_file, &reply)?;
        println!("Patch applied to {shown_path}.");
        log.append(task, attempt, &result.output)?;
    }

    println!("\n--- Maximum retries reached. Could not heal the project. ---");
    info!(verifications, patches, "heal exhausted");
    Ok(HealOutcome {
        stop: HealStop::Exhausted,
        verifications,
        patches,
    })
}
