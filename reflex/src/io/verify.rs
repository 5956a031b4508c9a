//! Verification runner: the pass/fail oracle for every heal attempt.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::types::VerificationResult;
use crate::io::config::VerifyConfig;
use crate::io::process::run_command;

/// Abstraction over verification backends.
///
/// Implementations never fail: a command that cannot be run is reported as a
/// failed verification with diagnostic text. Retry policy lives in the heal loop.
pub trait Verifier {
    fn verify(&self, target: &Path) -> VerificationResult;
}

/// Verifier that runs a configured command with the target directory appended.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    program: String,
    args: Vec<String>,
    workdir: PathBuf,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
}

impl CommandVerifier {
    pub fn new(workdir: impl Into<PathBuf>, cfg: &VerifyConfig) -> Self {
        let (program, args) = match cfg.command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (String::new(), Vec::new()),
        };
        Self {
            program,
            args,
            workdir: workdir.into(),
            timeout: cfg.timeout_secs.map(Duration::from_secs),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }

    fn display_command(&self, target: &Path) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.push(target.display().to_string());
        parts.join(" ")
    }
}

impl Verifier for CommandVerifier {
    #[instrument(skip_all, fields(target = %target.display()))]
    fn verify(&self, target: &Path) -> VerificationResult {
        if !target.is_dir() {
            warn!("verification target missing");
            return VerificationResult::failed(
                None,
                format!("verification target {} is not a directory", target.display()),
            );
        }

        let shown = self.display_command(target);
        println!("\n> Running verification: {shown}");
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(target).current_dir(&self.workdir);

        let output = match run_command(cmd, self.timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %err, "verification command could not run");
                return VerificationResult::failed(
                    None,
                    format!("failed to run verification command `{shown}`: {err:#}"),
                );
            }
        };

        let combined = output.combined();
        if output.status.success() && !output.timed_out {
            info!("verification passed");
            VerificationResult::passed(combined)
        } else {
            debug!(exit_code = ?output.status.code(), "verification failed");
            VerificationResult::failed(output.status.code(), combined)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn verifier(root: &Path, command: &[&str]) -> CommandVerifier {
        CommandVerifier::new(
            root,
            &VerifyConfig {
                command: command.iter().map(|s| s.to_string()).collect(),
                timeout_secs: None,
                output_limit_bytes: 10_000,
            },
        )
    }

    #[test]
    fn zero_exit_passes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = verifier(temp.path(), &["true"]).verify(temp.path());
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
    }

    #[test]
    fn nonzero_exit_fails_with_combined_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        // The target directory lands in `$0`, so the script ignores it.
        let result = verifier(
            temp.path(),
            &["sh", "-c", "echo 'assert 1 == 2'; echo boom 1>&2; exit 1"],
        )
        .verify(temp.path());
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(result.output, "assert 1 == 2\n\nboom\n");
    }

    #[test]
    fn target_is_passed_as_last_argument() {
        let temp = tempfile::tempdir().expect("tempdir");
        let project = temp.path().join("project");
        std::fs::create_dir_all(&project).expect("project dir");
        let result = verifier(temp.path(), &["ls"]).verify(&project);
        assert!(result.success);
        assert_eq!(result.output.trim(), "");
    }

    #[test]
    fn missing_command_is_a_failed_result() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = verifier(temp.path(), &["reflex-no-such-binary"]).verify(temp.path());
        assert!(!result.success);
        assert_eq!(result.exit_code, None);
        assert!(result.output.contains("failed to run verification command"));
    }

    #[test]
    fn missing_target_is_a_failed_result() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = verifier(temp.path(), &["true"]).verify(&temp.path().join("nope"));
        assert!(!result.success);
        assert!(result.output.contains("is not a directory"));
    }
}
