//! Are we deploying from CI automation or a local shell?

use std::env;

/// How this invocation was started, and therefore how the job should be
/// submitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionMode {
    /// Automated CI execution. Jobs are submitted over the orchestrator's
    /// HTTP API using resolved credentials.
    Automated,
    /// Local, manual execution. Jobs are handed to the orchestrator's own
    /// command-line tool, which picks up the operator's ambient session.
    Local,
}

impl ExecutionMode {
    /// Detect the mode from the standard `CI` marker.
    ///
    /// Call this once at the program edge and pass the value down.
    /// Submission logic takes the mode as an argument, so it stays testable
    /// without faking the process environment.
    pub fn detect() -> ExecutionMode {
        if env::var_os("CI").is_some() {
            ExecutionMode::Automated
        } else {
            ExecutionMode::Local
        }
    }

    /// Should this mode submit over the HTTP API?
    pub fn submits_via_api(self) -> bool {
        match self {
            ExecutionMode::Automated => true,
            // Local runs go through the orchestrator CLI, which already
            // handles conversion, submission, and progress reporting.
            ExecutionMode::Local => false,
        }
    }
}
