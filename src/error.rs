//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for the photoclassify application.
///
/// - 0: Success (every file accounted for)
/// - 1: General error (unexpected failure)
/// - 2: Configuration error (rejected before any file was touched)
/// - 3: Partial success (some per-file copies or comparisons failed)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the command completed with no per-file failures.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Configuration error: invalid path, date or filter chain.
    ConfigError = 2,
    /// Partial success: completed but some files ended in an error state.
    PartialSuccess = 3,
    /// Interrupted: the run was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "PC000",
            Self::GeneralError => "PC001",
            Self::ConfigError => "PC002",
            Self::PartialSuccess => "PC003",
            Self::Interrupted => "PC130",
        }
    }

    /// Pick the exit code for an error that escaped `run_app`.
    ///
    /// Configuration errors keep their dedicated code even when wrapped in
    /// `anyhow` context.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if err
            .chain()
            .any(|cause| cause.downcast_ref::<crate::config::ConfigError>().is_some())
        {
            Self::ConfigError
        } else {
            Self::GeneralError
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "PC001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
