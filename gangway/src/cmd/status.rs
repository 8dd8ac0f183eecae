//! The `status` subcommand.

use gangway_common::orchestrator::{self, OrchestratorClient};
use gangway_common::{prelude::*, secrets};

/// One-shot status query for a submitted job.
///
/// Reports the classification but never fails just because the job isn't
/// running; this is a read-only view, not a deployment gate.
pub fn run(job_name: &str) -> Result<()> {
    orchestrator::validate_job_name(job_name)?;
    let providers = secrets::default_providers();
    let resolved = secrets::resolve(&providers)?;
    let client = OrchestratorClient::new(resolved.orchestrator)?;
    let status = client.job_status(job_name)?;
    println!("{}", status);
    Ok(())
}
