//! Shared deterministic types for the heal loop.

/// Result of a single verification run.
///
/// Ephemeral: produced fresh for every attempt. Only `output` outlives the
/// attempt, as the error text of a failure record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub success: bool,
    /// Exit code, when the command ran to completion.
    pub exit_code: Option<i32>,
    /// Combined `stdout + "\n" + stderr`, or a diagnostic when the command
    /// could not be run at all.
    pub output: String,
}

impl VerificationResult {
    pub fn passed(output: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            output: output.into(),
        }
    }

    pub fn failed(exit_code: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code,
            output: output.into(),
        }
    }
}

/// Terminal state of a heal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealStop {
    /// Verification passed. `attempt` 0 means the baseline already passed before
    /// any patch was applied.
    Succeeded { attempt: u32 },
    /// Every attempt was used without a passing verification.
    Exhausted,
}

/// Summary of a heal run, including call counts for the loop contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealOutcome {
    pub stop: HealStop,
    /// Number of verification runs (baseline included).
    pub verifications: u32,
    /// Number of patch requests sent to the model.
    pub patches: u32,
}

impl HealOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.stop, HealStop::Succeeded { .. })
    }
}
