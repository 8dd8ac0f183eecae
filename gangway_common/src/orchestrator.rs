//! Client for the orchestrator's HTTP job API.
//!
//! Submission is a single authenticated POST of the converted job payload.
//! `200` is the only status we accept; on anything else the response body
//! is handed back to the operator untouched. After a successful
//! submission we poll the job's status at a fixed interval, up to a
//! bounded number of attempts, looking for the literal status `running`.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::blocking::Client;
use std::{thread::sleep, time::Duration};

use crate::prelude::*;
use crate::secrets::OrchestratorCredentials;

/// Header used to authenticate against the orchestrator.
const AUTH_HEADER: &str = "X-Auth-Token";

/// Outcome of a job submission.
#[derive(Debug)]
pub struct SubmitOutcome {
    /// Evaluation identifier returned by the scheduler. The orchestrator
    /// doesn't always supply one, and its absence is not an error.
    pub eval_id: Option<String>,
}

/// Classification of a job's scheduler status.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum JobStatus {
    /// The job reported the literal status `running`.
    Running,
    /// Any other reported status, carried verbatim.
    NotRunning(String),
}

impl JobStatus {
    /// Classify a raw status string. The comparison is exact and
    /// case-sensitive: `"Running"` and `"pending"` are both not-running.
    pub fn classify(raw: &str) -> JobStatus {
        if raw == "running" {
            JobStatus::Running
        } else {
            JobStatus::NotRunning(raw.to_owned())
        }
    }

    /// Is this the running state?
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::NotRunning(raw) => write!(f, "not running ({})", raw),
        }
    }
}

/// How the post-submission status poll should behave.
#[derive(Clone, Copy, Debug)]
pub struct PollPolicy {
    /// Fixed delay between checks. The first check happens after one full
    /// interval, giving the scheduler time to act on the submission.
    pub interval: Duration,
    /// Maximum number of checks before giving up with
    /// [`StatusCheckTimedOut`].
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(5),
            max_attempts: 12,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "EvalID", default)]
    eval_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    #[serde(rename = "Status")]
    status: String,
}

/// A blocking client for one orchestrator endpoint.
pub struct OrchestratorClient {
    credentials: OrchestratorCredentials,
    client: Client,
}

impl OrchestratorClient {
    /// Create a client from resolved credentials.
    pub fn new(credentials: OrchestratorCredentials) -> Result<OrchestratorClient> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("can't build HTTP client")?;
        Ok(OrchestratorClient {
            credentials,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.credentials.address.as_str().trim_end_matches('/'),
            path
        )
    }

    /// Submit a converted job payload.
    ///
    /// `200` is the only accepted status; anything else becomes
    /// [`SubmissionFailed`] carrying the response body verbatim. A `200`
    /// response missing the evaluation identifier is still a success.
    pub fn submit(&self, payload: &serde_json::Value) -> Result<SubmitOutcome> {
        let url = self.url("v1/jobs");
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header(AUTH_HEADER, &self.credentials.token)
            .json(payload)
            .send()
            .context("job submission request failed")?;
        let status = response.status();
        let body = response
            .text()
            .context("can't read submission response body")?;
        if status != reqwest::StatusCode::OK {
            return Err(Error::new(SubmissionFailed {
                status: status.as_u16(),
                body,
            }));
        }
        let eval_id = serde_json::from_str::<SubmitResponse>(&body)
            .ok()
            .and_then(|parsed| parsed.eval_id)
            .filter(|id| !id.is_empty());
        Ok(SubmitOutcome { eval_id })
    }

    /// One status read for the named job.
    pub fn job_status(&self, name: &str) -> Result<JobStatus> {
        let url = self.url(&format!("v1/job/{}", name));
        trace!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .header(AUTH_HEADER, &self.credentials.token)
            .send()
            .context("job status request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(format_err!(
                "job status request for {:?} returned {}",
                name,
                status
            ));
        }
        let parsed: JobStatusResponse = response
            .json()
            .context("can't parse job status response")?;
        Ok(JobStatus::classify(&parsed.status))
    }

    /// Poll at a fixed interval until the job reports `running`, making at
    /// most `policy.max_attempts` checks.
    pub fn wait_until_running(&self, name: &str, policy: PollPolicy) -> Result<JobStatus> {
        let mut last_status = None;
        for attempt in 1..=policy.max_attempts {
            sleep(policy.interval);
            let status = self.job_status(name)?;
            if status.is_running() {
                return Ok(status);
            }
            debug!(
                "job {} not running yet (check {}/{}): {}",
                name, attempt, policy.max_attempts, status
            );
            if let JobStatus::NotRunning(raw) = status {
                last_status = Some(raw);
            }
        }
        Err(Error::new(StatusCheckTimedOut {
            job: name.to_owned(),
            attempts: policy.max_attempts,
            last_status,
        }))
    }
}

lazy_static! {
    /// Legal job names. The name ends up in a URL path and in the
    /// orchestrator's DNS-facing service registry, so keep it to lowercase
    /// DNS label characters.
    static ref JOB_NAME: Regex =
        Regex::new("^[a-z0-9][a-z0-9-]{0,62}$").expect("invalid JOB_NAME regex");
}

/// Check that `name` is something the orchestrator will accept.
pub fn validate_job_name(name: &str) -> Result<()> {
    if JOB_NAME.is_match(name) {
        Ok(())
    } else {
        Err(format_err!("invalid job name {:?}", name))
    }
}
