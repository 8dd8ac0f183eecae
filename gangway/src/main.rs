//! Deployment glue for the web proxy: resolve credentials from the secret
//! store (or the CI environment) and hand a job to the cluster
//! orchestrator.

use gangway_common::errors::DisplayCausesExt;
use gangway_common::{prelude::*, tracing_support};
use std::process;
use structopt::StructOpt;

mod cmd;
mod convert;
mod manifest;

/// Command-line options, parsed using `structopt`.
#[derive(Debug, StructOpt)]
#[structopt(about = "Resolve deployment credentials and submit jobs to the cluster orchestrator.")]
enum Opt {
    /// Resolve deployment credentials and report where they came from,
    /// without submitting anything.
    #[structopt(name = "check")]
    Check,

    /// Resolve credentials, render and convert the job description, and
    /// submit it.
    #[structopt(name = "deploy")]
    Deploy(cmd::deploy::Opt),

    /// Query the scheduler status of a submitted job.
    #[structopt(name = "status")]
    Status {
        /// The logical name of the job.
        job_name: String,
    },
}

fn main() {
    if let Err(err) = run() {
        eprint!("{}", err.display_causes());
        process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_support::initialize_tracing();
    let opt = Opt::from_args();
    debug!("Args: {:?}", opt);

    // Read the CI marker exactly once, here at the edge. Everything below
    // takes the mode as a value.
    let mode = ExecutionMode::detect();

    match opt {
        Opt::Check => cmd::check::run(),
        Opt::Deploy(ref opt) => cmd::deploy::run(opt, mode),
        Opt::Status { ref job_name } => cmd::status::run(job_name),
    }
}
