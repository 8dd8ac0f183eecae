//! Error-handling code.

use std::fmt;

use anyhow::Error;

/// Support for displaying an error with a complete list of causes.
pub trait DisplayCausesExt {
    /// Display the error and its causes.
    fn display_causes(&self) -> DisplayCauses<'_>;
}

impl DisplayCausesExt for Error {
    fn display_causes(&self) -> DisplayCauses<'_> {
        DisplayCauses { err: self }
    }
}

/// Helper type used to display errors.
pub struct DisplayCauses<'a> {
    /// The error to display.
    err: &'a Error,
}

impl fmt::Display for DisplayCauses<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.err)?;
        let mut source = self.err.source();
        while let Some(next) = source {
            writeln!(f, "  caused by: {}", next)?;
            source = next.source();
        }
        Ok(())
    }
}

/// A required credential could not be resolved.
///
/// Carries the secret path and field we were looking for, so the operator
/// can see exactly which lookup came up empty.
#[derive(Debug)]
pub struct CredentialUnavailable {
    /// The secret path (or other source) that failed.
    pub path: String,
    /// The field we needed.
    pub field: String,
    /// Why the lookup failed.
    pub reason: String,
}

impl fmt::Display for CredentialUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "credential {}/{} unavailable: {}",
            self.path, self.field, self.reason
        )
    }
}

impl std::error::Error for CredentialUnavailable {}

/// The orchestrator rejected a job submission.
///
/// The response body is carried verbatim so the operator sees whatever the
/// orchestrator had to say about the payload.
#[derive(Debug)]
pub struct SubmissionFailed {
    /// HTTP status code of the submission response.
    pub status: u16,
    /// The response body, unmodified.
    pub body: String,
}

impl fmt::Display for SubmissionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job submission failed with status {}: {}",
            self.status, self.body
        )
    }
}

impl std::error::Error for SubmissionFailed {}

/// A submitted job never reported `running` within the poll budget.
#[derive(Debug)]
pub struct StatusCheckTimedOut {
    /// The logical name of the job we were watching.
    pub job: String,
    /// How many status checks we made.
    pub attempts: u32,
    /// The last status string the orchestrator reported, if any check
    /// succeeded at all.
    pub last_status: Option<String>,
}

impl fmt::Display for StatusCheckTimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last_status {
            Some(status) => write!(
                f,
                "job {} not running after {} status checks (last status: {})",
                self.job, self.attempts, status
            ),
            None => write!(
                f,
                "job {} not running after {} status checks",
                self.job, self.attempts
            ),
        }
    }
}

impl std::error::Error for StatusCheckTimedOut {}
