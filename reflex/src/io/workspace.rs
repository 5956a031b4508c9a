//! Project workspace management: clear, import, and directory copies.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use glob::Pattern;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::io::git::Git;

/// Placeholder kept in an otherwise empty project directory.
pub const GITKEEP: &str = ".gitkeep";

/// Result of clearing the project directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    /// The directory was emptied (`removed` entries) and `.gitkeep` restored.
    Cleared { removed: usize },
    /// There was no project directory to clear.
    Missing,
}

/// Where an imported project comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    GitUrl(String),
    LocalDir(PathBuf),
}

impl ImportSource {
    /// Classify a CLI argument: URLs and `*.git` are cloned, existing
    /// directories are copied, anything else is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.starts_with("http://") || raw.starts_with("https://") || raw.ends_with(".git") {
            return Ok(Self::GitUrl(raw.to_string()));
        }
        let path = PathBuf::from(raw);
        if path.is_dir() {
            return Ok(Self::LocalDir(path));
        }
        Err(anyhow!(
            "source path '{raw}' is not a valid Git URL or local directory"
        ))
    }
}

/// Remove everything inside `project_dir`, keep the directory, recreate `.gitkeep`.
#[instrument(skip_all, fields(project_dir = %project_dir.display()))]
pub fn clear_project(project_dir: &Path) -> Result<ClearOutcome> {
    if !project_dir.is_dir() {
        debug!("project directory missing, nothing to clear");
        return Ok(ClearOutcome::Missing);
    }
    let mut removed = 0usize;
    for entry in fs::read_dir(project_dir)
        .with_context(|| format!("read {}", project_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        let path = entry.path();
        if entry.file_type().context("file type")?.is_dir() {
            fs::remove_dir_all(&path).with_context(|| format!("remove {}", path.display()))?;
        } else {
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        }
        removed += 1;
    }
    let gitkeep = project_dir.join(GITKEEP);
    fs::write(&gitkeep, "").with_context(|| format!("write {}", gitkeep.display()))?;
    info!(removed, "project directory cleared");
    Ok(ClearOutcome::Cleared { removed })
}

/// Replace the project workspace with `source`.
///
/// The project directory is cleared first. A failed clone leaves it empty
/// (with `.gitkeep`) rather than missing.
#[instrument(skip_all, fields(project_dir = %project_dir.display()))]
pub fn import_project(source: &ImportSource, project_dir: &Path) -> Result<()> {
    fs::create_dir_all(project_dir)
        .with_context(|| format!("create {}", project_dir.display()))?;
    clear_project(project_dir)?;
    match source {
        ImportSource::GitUrl(url) => {
            let parent = project_dir
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let staging = tempfile::Builder::new()
                .prefix(".reflex-import-")
                .tempdir_in(parent)
                .with_context(|| format!("create staging dir in {}", parent.display()))?;
            let checkout = staging.path().join("checkout");
            info!(url = %url, "cloning repository");
            Git::clone_into(url, &checkout).context("clone repository")?;

            // Cloned aside because git refuses a non-empty target (.gitkeep).
            fs::remove_dir_all(project_dir)
                .with_context(|| format!("remove {}", project_dir.display()))?;
            fs::rename(&checkout, project_dir).with_context(|| {
                format!("move {} -> {}", checkout.display(), project_dir.display())
            })?;
        }
        ImportSource::LocalDir(dir) => {
            let copied = copy_dir_contents(dir, project_dir, &[])?;
            info!(copied, source = %dir.display(), "local directory copied");
        }
    }
    Ok(())
}

/// Recursively copy the contents of `src` into `dst`.
///
/// Entries whose file name matches any of `ignore` are skipped (directories
/// with their whole subtree). Returns the number of files copied.
pub fn copy_dir_contents(src: &Path, dst: &Path, ignore: &[String]) -> Result<usize> {
    let ignore = compile_ignores(ignore)?;
    let mut copied = 0usize;
    let walker = WalkDir::new(src)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_ignored(entry.file_name(), &ignore));
    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("create {}", target.display()))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::copy(entry.path(), &target).with_context(|| {
            format!("copy {} -> {}", entry.path().display(), target.display())
        })?;
        copied += 1;
    }
    Ok(copied)
}

/// Compile shell-style ignore patterns (`*`, `?`, `[...]`).
fn compile_ignores(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|raw| Pattern::new(raw).with_context(|| format!("invalid ignore pattern '{raw}'")))
        .collect()
}

fn is_ignored(name: &OsStr, patterns: &[Pattern]) -> bool {
    let name = name.to_string_lossy();
    patterns.iter().any(|pattern| pattern.matches(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_identity;

    fn export_ignores() -> Vec<String> {
        ["__pycache__", "*.pyc", ".gitkeep", "main.py"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn ignored(pattern: &str, name: &str) -> bool {
        let compiled = compile_ignores(&[pattern.to_string()]).expect("compile");
        is_ignored(OsStr::new(name), &compiled)
    }

    #[test]
    fn ignore_patterns_follow_shell_globbing() {
        assert!(ignored("*.pyc", "mod.pyc"));
        assert!(!ignored("*.pyc", "mod.py"));
        assert!(ignored("main.py", "main.py"));
        assert!(!ignored("main.py", "main.pyc"));
        assert!(ignored("test_*.py", "test_main.py"));
        assert!(ignored("*.py[co]", "mod.pyc"));
        assert!(ignored("*.py[co]", "mod.pyo"));
        assert!(!ignored("*.py[co]", "mod.py"));
        assert!(ignored("test_?.py", "test_a.py"));
        assert!(!ignored("test_?.py", "test_ab.py"));
    }

    #[test]
    fn invalid_ignore_pattern_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = copy_dir_contents(temp.path(), &temp.path().join("out"), &["[".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("invalid ignore pattern"));
    }

    #[test]
    fn clear_keeps_directory_and_restores_gitkeep() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = temp.path().join("project");
        fs::create_dir_all(project.join("pkg")).expect("pkg");
        fs::write(project.join("main.py"), "x").expect("main");
        fs::write(project.join("pkg/mod.py"), "y").expect("mod");

        let outcome = clear_project(&project).expect("clear");

        assert_eq!(outcome, ClearOutcome::Cleared { removed: 2 });
        let names: Vec<_> = fs::read_dir(&project)
            .expect("read")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![GITKEEP.to_string()]);
    }

    #[test]
    fn clear_missing_directory_is_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = clear_project(&temp.path().join("project")).expect("clear");
        assert_eq!(outcome, ClearOutcome::Missing);
    }

    #[test]
    fn copy_skips_ignored_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("__pycache__")).expect("cache");
        fs::create_dir_all(src.join("pkg")).expect("pkg");
        fs::write(src.join("__pycache__/x.pyc"), "").expect("x");
        fs::write(src.join("pkg/util.py"), "u").expect("util");
        fs::write(src.join("pkg/util.pyc"), "").expect("pyc");
        fs::write(src.join("main.py"), "m").expect("main");
        fs::write(src.join("README.md"), "r").expect("readme");

        let dst = temp.path().join("dst");
        let copied = copy_dir_contents(&src, &dst, &export_ignores()).expect("copy");

        assert_eq!(copied, 2);
        assert!(dst.join("README.md").is_file());
        assert!(dst.join("pkg/util.py").is_file());
        assert!(!dst.join("pkg/util.pyc").exists());
        assert!(!dst.join("__pycache__").exists());
        assert!(!dst.join("main.py").exists());
    }

    #[test]
    fn import_copies_local_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("existing");
        fs::create_dir_all(source.join("src")).expect("src");
        fs::write(source.join("src/app.js"), "console.log(1)").expect("app");
        let project = temp.path().join("project");
        fs::create_dir_all(&project).expect("project");
        fs::write(project.join("stale.py"), "old").expect("stale");

        let parsed = ImportSource::parse(&source.to_string_lossy()).expect("parse");
        assert_eq!(parsed, ImportSource::LocalDir(source.clone()));
        import_project(&parsed, &project).expect("import");

        assert!(project.join("src/app.js").is_file());
        assert!(!project.join("stale.py").exists());
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn failed_clone_leaves_empty_project() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = temp.path().join("project");
        fs::create_dir_all(&project).expect("project");
        fs::write(project.join("main.py"), "x").expect("main");

        let source = ImportSource::GitUrl(
            temp.path().join("missing/repo.git").to_string_lossy().into_owned(),
        );
        let err = import_project(&source, &project).unwrap_err();

        assert!(format!("{err:#}").contains("clone repository"));
        assert_eq!(entries(&project), vec![GITKEEP.to_string()]);
        // The staging directory is cleaned up.
        assert_eq!(entries(temp.path()), vec!["project".to_string()]);
    }

    #[test]
    fn import_clones_git_repository() {
        let temp = tempfile::tempdir().expect("tempdir");
        let origin = temp.path().join("origin.git");
        fs::create_dir_all(&origin).expect("origin");
        let git = Git::new(&origin).with_identity(Some(test_identity()));
        git.init().expect("init");
        fs::write(origin.join("app.py"), "print(1)\n").expect("app");
        git.add_all().expect("add");
        git.commit_staged("seed").expect("commit");
        let project = temp.path().join("project");

        let source = ImportSource::GitUrl(origin.to_string_lossy().into_owned());
        import_project(&source, &project).expect("import");

        assert!(project.join("app.py").is_file());
        assert!(project.join(".git").is_dir());
        assert!(!project.join(GITKEEP).exists());
    }

    #[test]
    fn parse_recognises_git_urls() {
        assert_eq!(
            ImportSource::parse("https://example.com/org/repo").expect("https"),
            ImportSource::GitUrl("https://example.com/org/repo".to_string())
        );
        assert_eq!(
            ImportSource::parse("git@example.com:org/repo.git").expect("ssh"),
            ImportSource::GitUrl("git@example.com:org/repo.git".to_string())
        );
    }

    #[test]
    fn parse_rejects_unknown_source() {
        let err = ImportSource::parse("/definitely/not/here").unwrap_err();
        assert!(err.to_string().contains("not a valid Git URL or local directory"));
    }
}
