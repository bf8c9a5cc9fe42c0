//! Error types for the launcher.

use crate::engine::EngineError;

/// Result type alias for launcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that terminate an install or update run.
///
/// User-declined paths (declining to proceed past warnings, cancelling the
/// interactive setup) are deliberately *not* represented here: they are
/// benign terminations and flow back as ordinary values, never as errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more hard requirement checks failed.
    #[error("host does not meet requirements: {failed} check(s) failed")]
    RequirementsNotMet { failed: usize },

    /// Warnings need interactive confirmation but there is no terminal.
    #[error(
        "requirement warnings present but no terminal to confirm on; \
         re-run with --ignore-warnings or -y to proceed unattended"
    )]
    NoTty,

    /// Neither docker nor podman is installed.
    #[error("no container runtime found (docker or podman required)\n{suggestion}")]
    NoRuntimeFound { suggestion: String },

    /// A previous rollover left a staging container behind.
    #[error(
        "rollover conflict: container '{container}' already exists; a previous \
         update left artifacts behind; inspect it, remove it manually, then retry"
    )]
    RolloverConflict { container: String },

    /// Install was requested but the worker container already exists.
    #[error("worker container '{container}' already exists; use --update to replace it")]
    WorkerExists { container: String },

    /// Update was requested but there is no worker container to replace.
    #[error("no worker container named '{container}' to update; run --install first")]
    WorkerMissing { container: String },

    /// The interactive setup run exited with an unexpected status.
    #[error("interactive setup failed with exit code {code}")]
    SetupFailed { code: i32 },

    /// An engine command returned a non-zero status.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Reading an operator answer from the terminal failed.
    #[error("failed to read operator input: {0}")]
    Prompt(#[from] std::io::Error),
}
