//! Prompt rendering for the heal loop and the guideline improver.

use std::path::Path;

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

const PATCH_TEMPLATE: &str = include_str!("prompts/patch.md");
const GUIDELINE_TEMPLATE: &str = include_str!("prompts/guideline.md");

/// Inputs for a patch request.
#[derive(Debug, Clone)]
pub struct PatchPrompt<'a> {
    /// System prompt plus guideline documents.
    pub context: &'a str,
    pub task: &'a str,
    /// Path shown to the model (relative to the engine root when possible).
    pub file_path: &'a str,
    /// Current full text of the target file.
    pub code: &'a str,
    /// Output of the failing verification.
    pub error: &'a str,
}

/// Inputs for a guideline rewrite request.
#[derive(Debug, Clone, Serialize)]
pub struct GuidelinePrompt<'a> {
    pub error: &'a str,
    pub guideline_path: &'a str,
    pub guideline: &'a str,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("patch", PATCH_TEMPLATE)
            .expect("patch template should be valid");
        env.add_template("guideline", GUIDELINE_TEMPLATE)
            .expect("guideline template should be valid");
        Self { env }
    }

    pub fn render_patch(&self, input: &PatchPrompt<'_>) -> Result<String> {
        let template = self.env.get_template("patch")?;
        let rendered = template.render(context! {
            context => input.context.trim_end(),
            task => input.task.trim(),
            file_path => input.file_path,
            language => fence_language(Path::new(input.file_path)),
            code => input.code,
            error => input.error.trim_end(),
        })?;
        Ok(rendered)
    }

    pub fn render_guideline(&self, input: &GuidelinePrompt<'_>) -> Result<String> {
        let template = self.env.get_template("guideline")?;
        Ok(template.render(input)?)
    }
}

/// Info string for a fenced block holding the file at `path`.
fn fence_language(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("py") => "python",
        Some("js" | "mjs" | "cjs") => "javascript",
        Some("ts") => "typescript",
        Some("rs") => "rust",
        Some("go") => "go",
        Some("rb") => "ruby",
        Some("java") => "java",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_prompt_contains_every_section() {
        let engine = PromptEngine::new();
        let rendered = engine
            .render_patch(&PatchPrompt {
                context: "You are an engineer.\n--- Guideline: style.md ---\nUse tabs.\n",
                task: "Fix add",
                file_path: "project/main.py",
                code: "def add(a, b):\n    return a - b\n",
                error: "AssertionError: 5 != 4\n",
            })
            .expect("render");

        assert!(rendered.starts_with("You are an engineer."));
        assert!(rendered.contains("Use tabs."));
        assert!(rendered.contains("The task is: Fix add"));
        assert!(rendered.contains("```python\ndef add(a, b):\n    return a - b\n"));
        assert!(rendered.contains("```\nAssertionError: 5 != 4\n```"));
    }

    #[test]
    fn patch_prompt_for_unknown_extension_uses_plain_fence() {
        let engine = PromptEngine::new();
        let rendered = engine
            .render_patch(&PatchPrompt {
                context: "ctx",
                task: "t",
                file_path: "project/Makefile",
                code: "all:",
                error: "e",
            })
            .expect("render");
        assert!(rendered.contains("currently contains this code:\n```\nall:"));
    }

    #[test]
    fn guideline_prompt_embeds_error_and_current_text() {
        let engine = PromptEngine::new();
        let rendered = engine
            .render_guideline(&GuidelinePrompt {
                error: "NameError: name 'x' is not defined",
                guideline_path: "guidelines/development_standards.md",
                guideline: "# Standards\n- Write tests.",
            })
            .expect("render");

        assert!(rendered.contains("NameError: name 'x' is not defined"));
        assert!(rendered.contains("`guidelines/development_standards.md`"));
        assert!(rendered.contains("```markdown\n# Standards\n- Write tests.\n```"));
    }

    #[test]
    fn rendering_does_not_html_escape() {
        let engine = PromptEngine::new();
        let rendered = engine
            .render_guideline(&GuidelinePrompt {
                error: "expected <int> & got 'str'",
                guideline_path: "g.md",
                guideline: "",
            })
            .expect("render");
        assert!(rendered.contains("expected <int> & got 'str'"));
    }
}
