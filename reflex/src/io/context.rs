//! Prompt context assembled from the system prompt and guideline documents.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::io::paths::EnginePaths;

const INTRO: &str =
    "You are an autonomous AI software engineer. Your task is to fix a bug in the following project.\n";

/// Read a file, or describe why it could not be read.
///
/// Missing inputs still go into the prompt so the model sees what is absent.
pub fn read_or_placeholder(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => format!("Error: File not found at {}", path.display()),
    }
}

/// Concatenate the intro, the system prompt and every guideline document.
///
/// Guidelines are read in file-name order. A file in the guidelines directory
/// named like the system prompt is skipped. Fails when the guidelines directory
/// does not exist.
pub fn build_context(paths: &EnginePaths) -> Result<String> {
    let dir = &paths.guidelines_dir;
    if !dir.is_dir() {
        return Err(anyhow!("guidelines directory {} not found", dir.display()));
    }

    let system_name = file_name(&paths.system_prompt);
    let mut context = String::from(INTRO);
    context.push_str(&format!("\n--- System Prompt: {system_name} ---\n"));
    context.push_str(&read_or_placeholder(&paths.system_prompt));

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        if entry.path().is_file() {
            entries.push(entry.path());
        }
    }
    entries.sort();

    for path in entries {
        let name = file_name(&path);
        if name == system_name {
            continue;
        }
        context.push_str(&format!("\n--- Guideline: {name} ---\n"));
        context.push_str(&read_or_placeholder(&path));
    }

    debug!(bytes = context.len(), "context assembled");
    Ok(context)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
