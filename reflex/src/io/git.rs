//! Git adapter for export and import.
//!
//! A small, explicit wrapper around `git` subprocess calls. Failures carry the
//! command line and git's trimmed stderr.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Commit author/committer identity passed as `-c user.*` overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    identity: Option<Identity>,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            identity: None,
        }
    }

    /// Commit as `identity` instead of relying on the user's git config.
    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    /// Create an empty repository in the working directory.
    #[instrument(skip_all, fields(workdir = %self.workdir.display()))]
    pub fn init(&self) -> Result<()> {
        debug!("initializing repository");
        self.run_checked(&["init"])?;
        Ok(())
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    /// Number of commits reachable from HEAD.
    pub fn commit_count(&self) -> Result<u32> {
        let out = self.run_capture(&["rev-list", "--count", "HEAD"])?;
        out.trim()
            .parse()
            .with_context(|| format!("parse commit count '{}'", out.trim()))
    }

    /// Clone `url` into `dest` (which must not exist or be empty).
    #[instrument(skip_all, fields(url))]
    pub fn clone_into(url: &str, dest: &Path) -> Result<()> {
        let dest_arg = dest.to_string_lossy().into_owned();
        Git::new(".").run_checked(&["clone", url, dest_arg.as_str()])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new("git");
        if let Some(identity) = &self.identity {
            cmd.arg("-c")
                .arg(format!("user.name={}", identity.name))
                .arg("-c")
                .arg(format!("user.email={}", identity.email));
        }
        cmd.args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_identity;
    use std::fs;

    #[test]
    fn init_add_commit_counts_one_commit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = Git::new(temp.path()).with_identity(Some(test_identity()));
        git.init().expect("init");
        fs::write(temp.path().join("a.txt"), "a").expect("write");

        git.add_all().expect("add");
        assert!(git.commit_staged("first").expect("commit"));
        assert!(!git.commit_staged("nothing staged").expect("noop commit"));
        assert_eq!(git.commit_count().expect("count"), 1);
    }

    #[test]
    fn failures_include_command_and_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        // Not a repository: rev-list fails.
        let err = Git::new(temp.path()).commit_count().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("git rev-list --count HEAD failed"));
    }

    #[test]
    fn clones_local_repository() {
        let temp = tempfile::tempdir().expect("tempdir");
        let origin = temp.path().join("origin");
        fs::create_dir_all(&origin).expect("origin dir");
        let git = Git::new(&origin).with_identity(Some(test_identity()));
        git.init().expect("init");
        fs::write(origin.join("main.py"), "x = 1\n").expect("write");
        git.add_all().expect("add");
        git.commit_staged("seed").expect("commit");

        let dest = temp.path().join("clone");
        Git::clone_into(&origin.to_string_lossy(), &dest).expect("clone");
        assert_eq!(
            fs::read_to_string(dest.join("main.py")).expect("read"),
            "x = 1\n"
        );
    }
}
