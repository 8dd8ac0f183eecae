//! The `deploy` subcommand.

use gangway_common::orchestrator::{OrchestratorClient, PollPolicy};
use gangway_common::prelude::*;
use gangway_common::secrets::{self, ResolvedCredentials};
use std::{fs, path::PathBuf, time::Duration};
use structopt::StructOpt;

use crate::convert;
use crate::manifest::render_job_description;

/// Options for `gangway deploy`.
#[derive(Debug, StructOpt)]
pub struct Opt {
    /// Path to the job description: a template for the orchestrator's job
    /// format, with placeholders for the dashboard credentials.
    #[structopt(parse(from_os_str))]
    job_description: PathBuf,

    /// Render and convert the job description, print the payload, and stop
    /// before submitting.
    #[structopt(long = "dry-run")]
    dry_run: bool,

    /// Submit via the orchestrator's CLI tool even when running under CI.
    #[structopt(long = "local")]
    local: bool,

    /// The orchestrator's CLI tool, used to convert (and locally run) job
    /// descriptions.
    #[structopt(long = "tool", default_value = "nomad")]
    tool: String,

    /// Seconds between post-submission status checks.
    #[structopt(long = "poll-interval", default_value = "5")]
    poll_interval: u64,

    /// Maximum number of status checks before giving up.
    #[structopt(long = "poll-attempts", default_value = "12")]
    poll_attempts: u32,
}

/// Run the whole deploy sequence: resolve, render, convert, submit, watch.
pub fn run(opt: &Opt, mode: ExecutionMode) -> Result<()> {
    let mode = if opt.local { ExecutionMode::Local } else { mode };

    // Resolve credentials before touching the job description, so a broken
    // secret store fails the run as early as possible.
    let providers = secrets::default_providers();
    let resolved = secrets::resolve(&providers)?;
    info!("credentials resolved via {}", resolved.provider);

    let template = fs::read_to_string(&opt.job_description).with_context(|| {
        format!(
            "can't read job description {}",
            opt.job_description.display()
        )
    })?;
    let rendered = render_job_description(&template, &resolved.dashboard)?;

    if !mode.submits_via_api() && !opt.dry_run {
        // Local runs hand the rendered description straight to the
        // orchestrator's own tool.
        return convert::run_locally(&opt.tool, &rendered);
    }

    // Convert to the orchestrator's machine format. The payload is opaque
    // to us except for the job's logical name, which the status poll needs.
    let payload = convert::to_submission_payload(&opt.tool, &rendered)?;
    let job_name = convert::job_name(&payload)?;

    if opt.dry_run {
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("can't format payload")?
        );
        return Ok(());
    }

    let policy = PollPolicy {
        interval: Duration::from_secs(opt.poll_interval),
        max_attempts: opt.poll_attempts,
    };
    let eval_id = submit_and_watch(&resolved, &payload, &job_name, policy)?;
    match eval_id {
        Some(id) => println!("{}", id),
        None => println!("evaluation id unavailable"),
    }
    Ok(())
}

/// Submit the converted payload and poll until the job is running.
///
/// Returns the evaluation identifier when the orchestrator supplied one. A
/// job that never reaches `running` within the poll budget is an error:
/// the primary caller is CI, and a deploy nobody observed running is a
/// failed deploy.
fn submit_and_watch(
    resolved: &ResolvedCredentials,
    payload: &serde_json::Value,
    job_name: &str,
    policy: PollPolicy,
) -> Result<Option<String>> {
    let client = OrchestratorClient::new(resolved.orchestrator.clone())?;
    let outcome = client.submit(payload)?;
    match &outcome.eval_id {
        Some(id) => info!("job {} submitted, evaluation {}", job_name, id),
        None => info!("job {} submitted, no evaluation id returned", job_name),
    }
    let status = client.wait_until_running(job_name, policy)?;
    info!("job {} is {}", job_name, status);
    Ok(outcome.eval_id)
}
