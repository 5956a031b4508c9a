//! Patch applier: writes a model-provided replacement file body to disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::fence::strip_code_fence;

/// Normalize `reply` (strip a surrounding code fence) and overwrite `target`.
///
/// Returns the text that was written.
#[instrument(skip_all, fields(target = %target.display()))]
pub fn apply_patch(target: &Path, reply: &str) -> Result<String> {
    let body = strip_code_fence(reply);
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(target, &body).with_context(|| format!("write patch to {}", target.display()))?;
    debug!(bytes = body.len(), "patch applied");
    Ok(body)
}
